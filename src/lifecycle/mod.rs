//! The contract every dynamically loaded command fulfils, and the fixed
//! driver that runs it.
//!
//! A command is prepared by [`Command::init`] and run by [`Command::exec`].
//! [`run_lifecycle`] checks the running version, splits the raw argument
//! vector into an [`InvocationContext`], calls both phases and turns any
//! failure into exit code 1 after logging it.

mod context;

use anyhow::Result;
use log::{debug, error};
use semver::Version;
use serde_json::Value;

use crate::error::EngineError;

pub use context::{InvocationContext, strip_internal};

/// Oldest pluck version able to host a command through the entry stub.
pub const MIN_RUNTIME_VERSION: Version = Version::new(0, 1, 0);

/// Version of this binary as used for compatibility checks.
pub fn runtime_version() -> Version {
    Version::parse(crate::VERSION).unwrap_or_else(|_| {
        Version::new(
            env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        )
    })
}

pub trait Command {
    /// Receive the invocation. Called once, before [`exec`](Self::exec).
    fn init(&mut self, _ctx: &InvocationContext) -> Result<()> {
        Err(EngineError::NotImplemented("init").into())
    }

    /// Do the work and return the process exit code.
    fn exec(&mut self) -> Result<i32> {
        Err(EngineError::NotImplemented("exec").into())
    }
}

fn check_runtime_version(runtime_version: &Version) -> Result<()> {
    if *runtime_version < MIN_RUNTIME_VERSION {
        return Err(EngineError::VersionTooLow {
            required: MIN_RUNTIME_VERSION.to_string(),
            current: runtime_version.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Drive `command` through its lifecycle. Never fails: errors are logged and
/// reported as exit code 1.
pub fn run_lifecycle(
    command: &mut dyn Command,
    raw_argv: Vec<Value>,
    runtime_version: &Version,
) -> i32 {
    let result = check_runtime_version(runtime_version)
        .and_then(|()| InvocationContext::from_raw(raw_argv))
        .and_then(|ctx| {
            debug!("Invoking command with {:?}", ctx);
            command.init(&ctx)
        })
        .and_then(|()| command.exec());

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            debug!("{:?}", e);
            1
        }
    }
}
