//! External command run through `sh -c`.

use std::process::Command;

use super::{CapturedChild, Liveness, ProcessOutput, Workload, thread_env};
use crate::error::Result;

/// One shell command per launch; a non-zero exit fails the run.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
    shell: String,
    env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: "sh".to_string(),
            env: Vec::new(),
        }
    }

    /// Limit the child's math libraries to `threads` threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.env.extend(thread_env(threads));
        self
    }

    /// Extra environment variable for the child only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(&self.command);
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        cmd
    }
}

impl Workload for ShellCommand {
    type Handle = CapturedChild;

    fn describe(&self) -> String {
        self.command.clone()
    }

    fn start(&mut self) -> Result<CapturedChild> {
        log::info!("running `{}`", self.command);
        CapturedChild::spawn(self.build(), self.command.clone())
    }

    fn poll(&mut self, handle: &mut CapturedChild) -> Result<Liveness> {
        Ok(match handle.try_exit()? {
            Some(code) => Liveness::Exited(code),
            None => Liveness::Running,
        })
    }

    fn drain(&mut self, handle: CapturedChild) -> Result<Vec<ProcessOutput>> {
        Ok(vec![handle.wait_output()?])
    }

    fn abort(&mut self, handle: CapturedChild) -> Result<()> {
        handle.kill()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_to_exit(cmd: &mut ShellCommand) -> Vec<ProcessOutput> {
        let mut handle = cmd.start().unwrap();
        while cmd.poll(&mut handle).unwrap() == Liveness::Running {
            std::thread::sleep(Duration::from_millis(5));
        }
        cmd.drain(handle).unwrap()
    }

    #[test]
    fn exit_status_is_reported() {
        let mut cmd = ShellCommand::new("exit 3");
        let outputs = run_to_exit(&mut cmd);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].code, 3);
        assert_eq!(outputs[0].label, "exit 3");
    }

    #[test]
    fn env_is_passed_per_spawn_only() {
        let mut cmd = ShellCommand::new("echo $OMP_NUM_THREADS").with_threads(2);
        let outputs = run_to_exit(&mut cmd);
        assert_eq!(outputs[0].stdout.trim(), "2");
        assert!(std::env::var("OMP_NUM_THREADS").map(|v| v != "2").unwrap_or(true));
    }

    #[test]
    fn poll_reports_running_then_exit() {
        let mut cmd = ShellCommand::new("sleep 0.2");
        let mut handle = cmd.start().unwrap();
        assert_eq!(cmd.poll(&mut handle).unwrap(), Liveness::Running);
        let outputs = cmd.drain(handle).unwrap();
        assert!(outputs[0].success());
    }

    #[test]
    fn abort_kills_long_command() {
        let mut cmd = ShellCommand::new("sleep 30").env("FOO", "bar");
        let handle = cmd.start().unwrap();
        cmd.abort(handle).unwrap();
    }
}
