use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;

use crate::error::EngineError;

/// A child process to run with inherited stdio.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    /// Added to the inherited environment.
    pub env: Vec<(String, String)>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Run the process to completion and return its exit code.
    async fn launch(&self, spec: &LaunchSpec) -> Result<i32>;
}

pub struct TokioLauncher;

#[async_trait]
impl ProcessLauncher for TokioLauncher {
    #[tracing::instrument(skip(self))]
    async fn launch(&self, spec: &LaunchSpec) -> Result<i32> {
        let status = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().cloned())
            .status()
            .await
            .map_err(|e| EngineError::SpawnFailed {
                program: spec.program.clone(),
                reason: e.to_string(),
            })?;

        debug!("{:?} finished with {}", spec.program, status);
        Ok(exit_code(&status))
    }
}

/// Exit code to report for a finished child; `128 + signal` when it was killed.
pub fn exit_code(status: &ExitStatus) -> i32 {
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

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::engine_error;

    fn sh(script: &str) -> LaunchSpec {
        LaunchSpec {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), script.into()],
            cwd: std::env::temp_dir(),
            env: vec![("PLUCK_LOG_LEVEL".into(), "debug".into())],
        }
    }

    #[tokio::test]
    async fn test_launch_returns_exit_code() {
        assert_eq!(TokioLauncher.launch(&sh("exit 0")).await.unwrap(), 0);
        assert_eq!(TokioLauncher.launch(&sh("exit 3")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_launch_forwards_env() {
        let code = TokioLauncher
            .launch(&sh(r#"[ "$PLUCK_LOG_LEVEL" = debug ]"#))
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_launch_killed_by_signal() {
        let code = TokioLauncher.launch(&sh("kill -9 $$")).await.unwrap();
        assert_eq!(code, 128 + 9);
    }

    #[tokio::test]
    async fn test_launch_missing_program_is_spawn_failed() {
        let spec = LaunchSpec {
            program: PathBuf::from("/nonexistent/pluck-stub"),
            args: vec![],
            cwd: std::env::temp_dir(),
            env: vec![],
        };
        let err = TokioLauncher.launch(&spec).await.unwrap_err();
        assert!(matches!(
            engine_error(&err),
            Some(EngineError::SpawnFailed { .. })
        ));
    }
}
