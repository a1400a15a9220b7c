use clap::{Arg, ArgAction};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::lifecycle::InvocationContext;
use crate::package::{LATEST, PackageSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct Positional {
    pub name: String,
    pub required: bool,
    pub help: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    pub long: String,
    pub short: Option<char>,
    pub help: String,
    /// `--long <value>` rather than a boolean switch.
    pub takes_value: bool,
}

/// A command the CLI knows about and the package that implements it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub package: String,
    pub version: String,
    pub about: String,
    pub positionals: Vec<Positional>,
    pub flags: Vec<Flag>,
}

/// `--dry-run` is delivered to the command as `dryRun`.
fn option_key(long: &str) -> String {
    let mut key = String::with_capacity(long.len());
    let mut upper = false;
    for c in long.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            key.extend(c.to_uppercase());
            upper = false;
        } else {
            key.push(c);
        }
    }
    key
}

impl CommandSpec {
    pub fn package_spec(&self) -> PackageSpec {
        PackageSpec::new(&self.package, &self.version)
    }

    pub fn to_clap(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.name.clone())
            .about(self.about.clone())
            .bin_name(format!("pluck {}", self.name));

        for positional in &self.positionals {
            cmd = cmd.arg(
                Arg::new(positional.name.clone())
                    .required(positional.required)
                    .help(positional.help.clone()),
            );
        }

        for flag in &self.flags {
            let mut arg = Arg::new(flag.long.clone())
                .long(flag.long.clone())
                .help(flag.help.clone());
            if let Some(short) = flag.short {
                arg = arg.short(short);
            }
            arg = if flag.takes_value {
                arg.action(ArgAction::Set)
            } else {
                arg.action(ArgAction::SetTrue)
            };
            cmd = cmd.arg(arg);
        }

        cmd
    }

    /// Parse `argv` (everything after the command name) into an invocation.
    pub fn parse(&self, argv: &[String]) -> Result<InvocationContext, clap::Error> {
        let matches = self
            .to_clap()
            .try_get_matches_from(std::iter::once(self.name.clone()).chain(argv.iter().cloned()))?;

        let args = self
            .positionals
            .iter()
            .filter_map(|p| matches.get_one::<String>(&p.name).cloned())
            .collect();

        let mut options = Map::new();
        for flag in &self.flags {
            let value = if flag.takes_value {
                match matches.get_one::<String>(&flag.long) {
                    Some(v) => Value::String(v.clone()),
                    None => continue,
                }
            } else {
                Value::Bool(matches.get_flag(&flag.long))
            };
            options.insert(option_key(&flag.long), value);
        }

        let mut metadata = Map::new();
        metadata.insert("name".into(), Value::String(self.name.clone()));
        metadata.insert("package".into(), Value::String(self.package.clone()));

        Ok(InvocationContext::new(args, metadata, options))
    }
}

/// Command name to implementing package.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The commands shipped with the CLI.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.insert(CommandSpec {
            name: "init".into(),
            package: "@pluck-cli/init".into(),
            version: LATEST.into(),
            about: "Create a new project".into(),
            positionals: vec![Positional {
                name: "projectName".into(),
                required: false,
                help: "Name of the project directory".into(),
            }],
            flags: vec![Flag {
                long: "force".into(),
                short: Some('f'),
                help: "Initialize even if the target directory is not empty".into(),
                takes_value: false,
            }],
        });
        table
    }

    pub fn insert(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name.clone(), spec);
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Result<&CommandSpec, EngineError> {
        self.commands
            .get(name)
            .ok_or_else(|| EngineError::UnknownCommand {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }
}
