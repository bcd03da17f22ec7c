//! Python environment for `renode-test`.
//!
//! The environment is created with `python -m venv` the first time it is
//! needed and recognised afterwards by its `pyvenv.cfg` plus interpreter. A
//! failed creation leaves no environment behind to be reused. Requirements are
//! installed with the environment's own interpreter; a stamp holding the
//! SHA-256 of the installed `requirements.txt` skips the install while the
//! file is unchanged.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    error::{RenodeRunError, RenodeRunResult},
    launch::exit_code,
};

const VENV_MARKER: &str = "pyvenv.cfg";
const REQUIREMENTS_STAMP: &str = ".renode-run.requirements.sha256";

#[cfg(not(windows))]
const BIN_DIR: &str = "bin";
#[cfg(windows)]
const BIN_DIR: &str = "Scripts";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VenvStatus {
    Created,
    Reused,
}

#[derive(Clone, Debug)]
pub struct TestEnvironment {
    root: PathBuf,
    python: PathBuf,
}

impl TestEnvironment {
    /// `python` is the interpreter used to create the environment.
    pub fn new(root: impl Into<PathBuf>, python: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            python: python.into(),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.join(VENV_MARKER).is_file() && self.interpreter().is_file()
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR)
    }

    pub fn interpreter(&self) -> PathBuf {
        self.bin_dir().join(if cfg!(windows) { "python.exe" } else { "python" })
    }

    /// Create the environment if needed and install `requirements` into it.
    pub fn ensure(&self, requirements: &Path) -> RenodeRunResult<VenvStatus> {
        let status = if self.exists() {
            crate::debug!("Reusing test environment {}", self.root.display());
            VenvStatus::Reused
        } else {
            self.create()?;
            VenvStatus::Created
        };

        self.install_requirements(requirements)?;
        Ok(status)
    }

    fn create(&self) -> RenodeRunResult<()> {
        crate::info!("Creating test environment in {}", self.root.display());
        let preexisting = self.root.exists();
        let mut cmd = Command::new(&self.python);
        cmd.arg("-m").arg("venv").arg(&self.root);

        let created = run_checked(cmd, "create the test environment with", &self.python)
            .and_then(|()| {
                if self.exists() {
                    Ok(())
                } else {
                    Err(RenodeRunError::process(
                        "create the test environment with",
                        &self.python,
                        format!("no interpreter at {}", self.interpreter().display()),
                    ))
                }
            });
        if created.is_err() {
            // A directory that existed before keeps its contents and only loses the marker.
            let cleanup = if preexisting {
                std::fs::remove_file(self.root.join(VENV_MARKER))
            } else {
                std::fs::remove_dir_all(&self.root)
            };
            match cleanup {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => crate::warn!("Failed to clean up {}: {e}", self.root.display()),
            }
        }
        created
    }

    fn install_requirements(&self, requirements: &Path) -> RenodeRunResult<()> {
        let contents = match std::fs::read(requirements) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                crate::warn!(
                    "{} not found, skipping test dependencies",
                    requirements.display()
                );
                return Ok(());
            }
            Err(e) => {
                return Err(RenodeRunError::file_system("read requirements", requirements, e))
            }
        };

        let digest = format!("{:x}", Sha256::digest(&contents));
        let stamp = self.root.join(REQUIREMENTS_STAMP);
        if std::fs::read_to_string(&stamp).is_ok_and(|s| s.trim() == digest) {
            crate::debug!("Test dependencies are up to date");
            return Ok(());
        }

        crate::info!("Installing test dependencies from {}", requirements.display());
        let interpreter = self.interpreter();
        let mut cmd = Command::new(&interpreter);
        cmd.args(["-m", "pip", "install", "-r"]).arg(requirements);
        run_checked(cmd, "install test dependencies with", &interpreter)?;

        std::fs::write(&stamp, digest)
            .map_err(|e| RenodeRunError::file_system("write requirements stamp", stamp, e))
    }

    /// `VIRTUAL_ENV` and a `PATH` starting with the environment's `bin`.
    pub fn activation_env(&self) -> RenodeRunResult<Vec<(String, OsString)>> {
        let mut paths = vec![self.bin_dir()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        let path = std::env::join_paths(paths).map_err(|e| RenodeRunError::InvalidConfig {
            field: "PATH",
            reason: e.to_string(),
        })?;

        Ok(vec![
            ("VIRTUAL_ENV".to_owned(), self.root.clone().into_os_string()),
            ("PATH".to_owned(), path),
        ])
    }
}

fn run_checked(mut cmd: Command, action: &'static str, program: &Path) -> RenodeRunResult<()> {
    crate::debug!("Running {cmd:?}");
    let status = cmd
        .status()
        .map_err(|e| RenodeRunError::process(action, program, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(RenodeRunError::process(
            action,
            program,
            format!("exited with {}", exit_code(status)),
        ))
    }
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use crate::launch::tests::script;

    /// A `python3` stand-in that understands `-m venv DIR` and whose venv
    /// interpreter logs every `-m pip` call to `<dir>/pip.log`.
    pub(crate) fn fake_python(dir: &Path) -> PathBuf {
        let python = dir.join("fake-python3");
        let log = dir.join("pip.log");
        script(
            &python,
            &format!(
                r#"echo venv >> '{created}'
mkdir -p "$3/bin"
touch "$3/pyvenv.cfg"
printf '#!/bin/sh\necho "$*" >> {log}\n' > "$3/bin/python"
chmod +x "$3/bin/python""#,
                created = dir.join("venv.log").display(),
                log = log.display(),
            ),
        );
        python
    }

    fn lines(path: &Path) -> usize {
        std::fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
    }

    #[test]
    fn environment_is_created_once_and_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let python = fake_python(tmp.path());
        let requirements = tmp.path().join("requirements.txt");
        std::fs::write(&requirements, "robotframework==6.1\n").unwrap();
        let env = TestEnvironment::new(tmp.path().join("venv"), python);

        assert_eq!(env.ensure(&requirements).unwrap(), VenvStatus::Created);
        assert_eq!(env.ensure(&requirements).unwrap(), VenvStatus::Reused);

        assert!(env.exists());
        assert_eq!(lines(&tmp.path().join("venv.log")), 1);
        assert_eq!(lines(&tmp.path().join("pip.log")), 1);
    }

    #[test]
    fn changed_requirements_are_reinstalled() {
        let tmp = tempfile::tempdir().unwrap();
        let python = fake_python(tmp.path());
        let requirements = tmp.path().join("requirements.txt");
        let env = TestEnvironment::new(tmp.path().join("venv"), python);

        std::fs::write(&requirements, "robotframework==6.1\n").unwrap();
        env.ensure(&requirements).unwrap();
        std::fs::write(&requirements, "robotframework==7.0\n").unwrap();
        env.ensure(&requirements).unwrap();

        assert_eq!(lines(&tmp.path().join("venv.log")), 1);
        assert_eq!(lines(&tmp.path().join("pip.log")), 2);
    }

    #[test]
    fn failing_interpreter_is_a_process_error() {
        let tmp = tempfile::tempdir().unwrap();
        let python = tmp.path().join("broken-python");
        script(&python, "exit 2");
        let env = TestEnvironment::new(tmp.path().join("venv"), python);

        let err = env.ensure(&tmp.path().join("requirements.txt")).unwrap_err();
        match err {
            RenodeRunError::Process { reason, .. } => assert!(reason.contains('2'), "{reason}"),
            other => panic!("expected a process error, got {other}"),
        }
    }

    #[test]
    fn failed_creation_is_not_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("venv");
        let requirements = tmp.path().join("requirements.txt");
        std::fs::write(&requirements, "robotframework==6.1\n").unwrap();

        // Like a Debian python3 without ensurepip: pyvenv.cfg is written, then it fails.
        let no_ensurepip = tmp.path().join("no-ensurepip-python3");
        script(&no_ensurepip, "mkdir -p \"$3\"\ntouch \"$3/pyvenv.cfg\"\nexit 1");
        let broken = TestEnvironment::new(&root, no_ensurepip);
        assert!(broken.ensure(&requirements).is_err());
        assert!(!root.exists());

        let env = TestEnvironment::new(&root, fake_python(tmp.path()));
        assert_eq!(env.ensure(&requirements).unwrap(), VenvStatus::Created);
        assert_eq!(lines(&tmp.path().join("pip.log")), 1);
    }

    #[test]
    fn marker_without_interpreter_is_recreated() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("venv");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(VENV_MARKER), "home = /usr/bin\n").unwrap();

        let env = TestEnvironment::new(&root, fake_python(tmp.path()));
        assert!(!env.exists());
        assert_eq!(
            env.ensure(&tmp.path().join("requirements.txt")).unwrap(),
            VenvStatus::Created
        );
        assert!(env.interpreter().is_file());
    }

    #[test]
    fn activation_puts_the_environment_first_on_path() {
        let env = TestEnvironment::new("/opt/venv", "python3");
        let vars = env.activation_env().unwrap();
        let path = &vars.iter().find(|(k, _)| k == "PATH").unwrap().1;
        let first = std::env::split_paths(path).next().unwrap();
        assert_eq!(first, Path::new("/opt/venv/bin"));
    }
}
