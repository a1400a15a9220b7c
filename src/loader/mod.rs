//! Turning an entry file into a runnable [`Command`].
//!
//! The host never loads package code itself. It relaunches its own binary as
//! `pluck __run <entry> --context <json>`, and that stub process uses an
//! [`EntryLoader`] to build the command and drives it with
//! [`run_lifecycle`](crate::lifecycle::run_lifecycle).

use anyhow::{Result, anyhow};
use log::{debug, error};
use semver::Version;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::dispatch::exit_code;
use crate::error::EngineError;
use crate::lifecycle::{Command, InvocationContext, run_lifecycle};
use crate::runtime::Runtime;

/// Environment variable carrying the full invocation as JSON.
pub const INVOCATION_ENV: &str = "PLUCK_INVOCATION";

#[cfg_attr(test, mockall::automock)]
pub trait EntryLoader {
    fn load(&self, entry: &Path) -> Result<Box<dyn Command>>;
}

/// Loads an entry file as an external program.
pub struct ProgramLoader<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> ProgramLoader<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }
}

impl<R: Runtime> EntryLoader for ProgramLoader<'_, R> {
    fn load(&self, entry: &Path) -> Result<Box<dyn Command>> {
        if !self.runtime.exists(entry) || self.runtime.is_dir(entry) {
            return Err(anyhow!("Entry file {:?} does not exist", entry));
        }
        Ok(Box::new(ExternalCommand::new(entry.to_path_buf())))
    }
}

/// Program and leading arguments used to run `entry`, chosen by extension.
pub fn interpreter_for(entry: &Path) -> (OsString, Vec<OsString>) {
    let ext = entry
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let script = entry.as_os_str().to_os_string();
    match ext.as_deref() {
        Some("js" | "cjs" | "mjs") => ("node".into(), vec![script]),
        Some("py") => ("python3".into(), vec![script]),
        Some("sh") => ("sh".into(), vec![script]),
        Some("cmd" | "bat") if cfg!(windows) => ("cmd".into(), vec!["/c".into(), script]),
        _ => (script, Vec::new()),
    }
}

/// Render parsed options as command-line flags.
///
/// `true` becomes `--key`, strings and numbers `--key value`, arrays repeat the
/// flag per element. `false`, `null` and nested objects are left out.
pub fn options_to_flags(options: &Map<String, Value>) -> Vec<String> {
    let mut flags = Vec::new();
    for (key, value) in options {
        push_flag(&mut flags, key, value);
    }
    flags
}

fn push_flag(flags: &mut Vec<String>, key: &str, value: &Value) {
    match value {
        Value::Bool(true) => flags.push(format!("--{}", key)),
        Value::String(s) => flags.extend([format!("--{}", key), s.clone()]),
        Value::Number(n) => flags.extend([format!("--{}", key), n.to_string()]),
        Value::Array(items) => {
            for item in items {
                push_flag(flags, key, item);
            }
        }
        Value::Bool(false) | Value::Null => {}
        Value::Object(_) => debug!("Not passing object option --{}", key),
    }
}

/// Runs an entry file as a child process with inherited stdio.
pub struct ExternalCommand {
    entry: PathBuf,
    context: Option<InvocationContext>,
}

impl ExternalCommand {
    pub fn new(entry: PathBuf) -> Self {
        Self {
            entry,
            context: None,
        }
    }
}

impl Command for ExternalCommand {
    fn init(&mut self, ctx: &InvocationContext) -> Result<()> {
        self.context = Some(ctx.clone());
        Ok(())
    }

    fn exec(&mut self) -> Result<i32> {
        let ctx = self
            .context
            .as_ref()
            .ok_or(EngineError::NotImplemented("init"))?;
        let (program, leading) = interpreter_for(&self.entry);

        debug!("Running {:?} {:?}", program, leading);
        let status = std::process::Command::new(&program)
            .args(&leading)
            .args(&ctx.args)
            .args(options_to_flags(&ctx.options))
            .env(INVOCATION_ENV, ctx.to_json()?)
            .status()
            .map_err(|e| EngineError::SpawnFailed {
                program: PathBuf::from(&program),
                reason: e.to_string(),
            })?;

        Ok(exit_code(&status))
    }
}

/// Body of the `__run` stub: load `entry`, then run it with the serialized context.
pub fn run_entry_stub(
    loader: &dyn EntryLoader,
    entry: &Path,
    context_json: &str,
    runtime_version: &Version,
) -> i32 {
    let raw = match serde_json::from_str::<Vec<Value>>(context_json) {
        Ok(raw) => raw,
        Err(e) => {
            error!("{}", EngineError::InvalidInvocation(e.to_string()));
            return 1;
        }
    };

    let mut command = match loader.load(entry) {
        Ok(command) => command,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    run_lifecycle(command.as_mut(), raw, runtime_version)
}
