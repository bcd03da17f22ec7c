use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    error::{RenodeRunError, RenodeRunResult},
    launch::exit_code,
};

/// Device tree (`.dts`) to Renode platform description (`.repl`).
pub trait PlatformTranslator {
    fn translate(&self, device_tree: &Path) -> RenodeRunResult<String>;
}

/// Runs the external `dts2repl` tool and captures what it prints.
#[derive(Clone, Debug)]
pub struct Dts2Repl {
    program: PathBuf,
}

impl Dts2Repl {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PlatformTranslator for Dts2Repl {
    fn translate(&self, device_tree: &Path) -> RenodeRunResult<String> {
        crate::debug!("Translating {} with {}", device_tree.display(), self.program.display());
        let output = Command::new(&self.program)
            .arg(device_tree)
            .output()
            .map_err(|e| RenodeRunError::process("run", &self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenodeRunError::process(
                "translate device tree with",
                &self.program,
                format!("exited with {}: {}", exit_code(output.status), stderr.trim()),
            ));
        }

        let repl = String::from_utf8(output.stdout).map_err(|e| {
            RenodeRunError::process("translate device tree with", &self.program, e)
        })?;
        if repl.trim().is_empty() {
            return Err(RenodeRunError::process(
                "translate device tree with",
                &self.program,
                "produced no platform description",
            ));
        }
        Ok(repl)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::launch::tests::script;

    #[test]
    fn stdout_becomes_the_platform_description() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = tmp.path().join("dts2repl");
        script(&tool, r#"echo "// from $1""#);

        let repl = Dts2Repl::new(&tool).translate(Path::new("board.dts")).unwrap();
        assert_eq!(repl, "// from board.dts\n");
    }

    #[test]
    fn failures_carry_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = tmp.path().join("dts2repl");
        script(&tool, "echo 'no such node' >&2\nexit 1");

        let err = Dts2Repl::new(&tool).translate(Path::new("board.dts")).unwrap_err();
        assert!(err.to_string().contains("no such node"), "got {err}");
    }

    #[test]
    fn missing_tool_is_a_process_error() {
        let err = Dts2Repl::new("/nonexistent/dts2repl")
            .translate(Path::new("board.dts"))
            .unwrap_err();
        assert!(matches!(err, RenodeRunError::Process { .. }), "got {err}");
    }
}
