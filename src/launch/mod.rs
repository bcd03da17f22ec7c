//! Running a cached distribution
//! =============================
//!
//! [`Launcher`] turns a [`CacheEntry`] plus user arguments into a
//! [`LaunchSpec`], runs it in the foreground and hands back the child's exit
//! code. The child inherits stdio and the process group. A SIGINT delivered
//! to this process is passed on to the running child, and we keep waiting
//! for it to exit.
//!
//! The `renode-test` entry point additionally needs its Python environment,
//! see [`venv`].

pub mod venv;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
    sync::{
        atomic::{AtomicU32, Ordering},
        OnceLock,
    },
};

use serde::Serialize;

use crate::{
    artifact::cache::CacheEntry,
    config::RenodeRunConfig,
    error::{RenodeRunError, RenodeRunResult},
    launch::venv::TestEnvironment,
};

const RESULTS_DIR_FLAG: &str = "--results-dir";
const RESULTS_DIR_SHORT: &str = "-r";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum EntryPoint {
    /// `renode`
    #[default]
    Main,
    /// `renode-test`, run inside the test environment.
    Test,
}

/// Everything needed to start one child process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LaunchSpec {
    pub executable_path: PathBuf,
    pub fixed_args: Vec<String>,
    pub forwarded_args: Vec<String>,
    /// `None` inherits the current directory.
    pub working_directory: Option<PathBuf>,
    pub envs: Vec<(String, OsString)>,
}

impl LaunchSpec {
    pub fn new(executable_path: impl Into<PathBuf>) -> Self {
        Self {
            executable_path: executable_path.into(),
            fixed_args: Vec::new(),
            forwarded_args: Vec::new(),
            working_directory: None,
            envs: Vec::new(),
        }
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.executable_path);
        cmd.args(&self.fixed_args).args(&self.forwarded_args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run in the foreground and return the exit code.
    pub fn run(&self) -> RenodeRunResult<i32> {
        forward_interrupts();
        let mut cmd = self.command();
        crate::info!("Running {cmd:?}");

        let mut child = cmd
            .spawn()
            .map_err(|e| RenodeRunError::process("run", &self.executable_path, e))?;
        CHILD_PID.store(child.id(), Ordering::SeqCst);
        let status = child.wait();
        CHILD_PID.store(0, Ordering::SeqCst);

        let status =
            status.map_err(|e| RenodeRunError::process("wait for", &self.executable_path, e))?;
        let code = exit_code(status);
        crate::debug!("{} exited with {code}", self.executable_path.display());
        Ok(code)
    }
}

#[derive(Clone, Debug)]
pub struct Launcher {
    test_env: TestEnvironment,
}

impl Launcher {
    pub fn new(config: &RenodeRunConfig) -> Self {
        Self {
            test_env: TestEnvironment::new(config.default_venv_dir(), &config.python),
        }
    }

    /// Use a different directory for the test environment (`test --venv`).
    pub fn with_venv_dir(mut self, venv_dir: impl Into<PathBuf>) -> Self {
        self.test_env = self.test_env.with_root(venv_dir);
        self
    }

    pub fn test_env(&self) -> &TestEnvironment {
        &self.test_env
    }

    pub fn run(
        &self,
        entry: &CacheEntry,
        extra_args: &[String],
        entry_point: EntryPoint,
    ) -> RenodeRunResult<i32> {
        self.run_with(entry, entry_point, Vec::new(), extra_args)
    }

    /// Like [`run`](Self::run) with arguments placed before the user's.
    pub fn run_with(
        &self,
        entry: &CacheEntry,
        entry_point: EntryPoint,
        fixed_args: Vec<String>,
        extra_args: &[String],
    ) -> RenodeRunResult<i32> {
        self.spec(entry, entry_point, fixed_args, extra_args)?.run()
    }

    /// Build the [`LaunchSpec`]. For [`EntryPoint::Test`] this prepares the
    /// test environment first.
    pub fn spec(
        &self,
        entry: &CacheEntry,
        entry_point: EntryPoint,
        mut fixed_args: Vec<String>,
        extra_args: &[String],
    ) -> RenodeRunResult<LaunchSpec> {
        let executable = match entry_point {
            EntryPoint::Main => entry.executable(),
            EntryPoint::Test => entry.test_executable(),
        };
        ensure_executable(&executable)?;

        let mut spec = LaunchSpec::new(executable);
        if entry_point == EntryPoint::Test {
            self.test_env.ensure(&entry.test_requirements())?;
            spec.envs = self.test_env.activation_env()?;

            if let Some(results) = entry.companion_test_dir() {
                if !has_results_dir(extra_args) {
                    fixed_args.push(RESULTS_DIR_FLAG.to_owned());
                    fixed_args.push(results.to_string_lossy().into_owned());
                }
            }
        }
        spec.fixed_args = fixed_args;
        spec.forwarded_args = extra_args.to_vec();
        Ok(spec)
    }
}

fn ensure_executable(path: &Path) -> RenodeRunResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RenodeRunError::process(
            "locate",
            path,
            "executable is missing from the cached distribution",
        ))
    }
}

fn has_results_dir(args: &[String]) -> bool {
    args.iter().any(|a| {
        a == RESULTS_DIR_SHORT
            || a == RESULTS_DIR_FLAG
            || a.starts_with(&format!("{RESULTS_DIR_FLAG}="))
    })
}

/// Exit code of `status`; signal deaths map to `128 + signal` like a shell.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

static INTERRUPT_HANDLER: OnceLock<()> = OnceLock::new();

/// Pid of the child in the foreground, 0 when none is running.
static CHILD_PID: AtomicU32 = AtomicU32::new(0);

/// Install (once) a handler that hands SIGINT to the running child instead
/// of terminating us, so we can still report the child's exit code.
fn forward_interrupts() {
    INTERRUPT_HANDLER.get_or_init(|| {
        if let Err(e) = ctrlc::set_handler(forward_to_child) {
            crate::warn!("Failed to install the Ctrl-C handler: {e}");
        }
    });
}

fn forward_to_child() {
    let pid = CHILD_PID.load(Ordering::SeqCst);
    if pid == 0 {
        return;
    }
    #[cfg(unix)]
    {
        use nix::{
            errno::Errno,
            sys::signal::{kill, Signal},
            unistd::Pid,
        };
        match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
            Ok(_) | Err(Errno::ESRCH) => crate::debug!("Interrupt forwarded to {pid}"),
            Err(e) => crate::warn!("Failed to forward interrupt to {pid}: {e}"),
        }
    }
}
