use crate::error::CommandFailure;
use std::io;
use std::process::Command;

/// Captured result of one external process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        combined.push_str(&self.stderr);
        combined
    }
}

/// Seam between the engine and the host's process table
pub trait CommandRunner {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        (**self).run(argv)
    }
}

/// Runs commands as real child processes and waits for them to finish
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let output = Command::new(program).args(args).output()?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a command whose non-zero exit is a failure, returning its combined output
pub fn run_mutating<R: CommandRunner + ?Sized>(
    runner: &R,
    argv: Vec<String>,
) -> Result<String, CommandFailure> {
    tracing::debug!(command = %argv.join(" "), "running");
    let result = runner.run(&argv);
    require_success(argv, result)
}

fn require_success(
    argv: Vec<String>,
    result: io::Result<CommandOutput>,
) -> Result<String, CommandFailure> {
    match result {
        Ok(output) if output.success() => Ok(output.combined()),
        Ok(output) => Err(CommandFailure {
            command: argv,
            exit_code: output.exit_code,
            output: output.combined(),
        }),
        Err(e) => Err(CommandFailure {
            command: argv,
            exit_code: None,
            output: e.to_string(),
        }),
    }
}

/// One filter-table binary (`iptables` or `ip6tables`) with its fixed leading flags
pub struct FilterTool<R> {
    runner: R,
    base: Vec<String>,
}

impl<R: CommandRunner> FilterTool<R> {
    pub fn new(runner: R, base: Vec<String>) -> Self {
        Self { runner, base }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn argv(&self, args: &[String]) -> Vec<String> {
        let mut argv = self.base.clone();
        argv.extend_from_slice(args);
        argv
    }

    /// Run a query and report its exit code with combined output.
    ///
    /// A process that cannot be spawned reports no exit code.
    pub fn run(&self, args: &[String]) -> (Option<i32>, String) {
        let argv = self.argv(args);
        tracing::debug!(command = %argv.join(" "), "querying");

        match self.runner.run(&argv) {
            Ok(output) => (output.exit_code, output.combined()),
            Err(e) => {
                tracing::warn!(command = %argv.join(" "), error = %e, "query could not be started");
                (None, e.to_string())
            }
        }
    }

    /// Exit status as a boolean: zero is true, anything else is false
    pub fn check(&self, args: &[String]) -> bool {
        let (code, output) = self.run(args);
        if code != Some(0) {
            tracing::debug!(exit_code = ?code, output = %output.trim(), "check returned false");
        }
        code == Some(0)
    }

    /// Read-only command whose output is needed; a non-zero exit is a failure
    pub fn query(&self, args: &[String]) -> Result<String, CommandFailure> {
        let argv = self.argv(args);
        tracing::debug!(command = %argv.join(" "), "querying");
        let result = self.runner.run(&argv);
        require_success(argv, result)
    }

    pub fn run_mutating(&self, args: &[String]) -> Result<String, CommandFailure> {
        run_mutating(&self.runner, self.argv(args))
    }
}
