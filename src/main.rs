use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::{error, info, warn};
use pluck::{
    config::{Config, DEFAULT_LOG_LEVEL, absolute_path, resolve_home},
    dispatch::{self, CommandTable, STUB_COMMAND},
    lifecycle::runtime_version,
    loader::{ProgramLoader, run_entry_stub},
    registry::DEFAULT_REGISTRY,
    runtime::{RealRuntime, Runtime},
};
use std::path::PathBuf;
use std::time::Duration;

/// pluck - run commands that live in registry packages
///
/// Each command is implemented by a package fetched on demand, cached under
/// the pluck home directory and executed in its own process.
///
/// Examples:
///   pluck init my-app          # Create a project with the latest @pluck-cli/init
///   pluck -d init my-app -f    # Same, with debug logging, overwriting files
#[derive(Parser, Debug)]
#[command(name = "pluck", author, version = pluck::VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Home directory for caches (default: ~/.pluck)
    #[arg(long, env = "PLUCK_HOME", value_name = "PATH")]
    home: Option<PathBuf>,

    /// Name of the home directory under the user's home
    #[arg(long = "cli-home", env = "PLUCK_CLI_HOME", hide = true)]
    cli_home: Option<String>,

    /// Run the command from a local package directory instead of the registry
    #[arg(long = "target-path", env = "PLUCK_TARGET_PATH", value_name = "PATH")]
    target_path: Option<PathBuf>,

    /// Package registry URL
    #[arg(long, env = "PLUCK_REGISTRY", value_name = "URL", default_value = DEFAULT_REGISTRY)]
    registry: String,

    /// Registry query timeout in seconds
    #[arg(
        long = "registry-timeout",
        env = "PLUCK_REGISTRY_TIMEOUT",
        value_name = "SECONDS",
        default_value_t = 5
    )]
    registry_timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log filter (error, warn, info, debug, trace)
    #[arg(long = "log-level", env = "PLUCK_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Skip the check for a newer pluck release
    #[arg(long = "no-update-check")]
    no_update_check: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run a package entry point (used internally)
    #[command(name = STUB_COMMAND, hide = true)]
    Run(RunArgs),

    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    entry: PathBuf,

    /// Serialized invocation
    #[arg(long)]
    context: String,
}

impl Cli {
    fn log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }

    fn config<R: Runtime>(&self, runtime: &R) -> Result<Config> {
        let home = resolve_home(runtime, self.home.clone(), self.cli_home.as_deref())?;
        let mut config = Config::new(home);
        config.target_path = self
            .target_path
            .as_deref()
            .map(|path| absolute_path(runtime, path))
            .transpose()?;
        config.registry = self.registry.clone();
        config.query_timeout = Duration::from_secs(self.registry_timeout);
        config.debug = self.debug;
        config.log_level = self.log_level.clone();
        config.update_check = !self.no_update_check;
        Ok(config)
    }
}

fn print_help() {
    let _ = Cli::command().print_help();
    println!(
        "\nAvailable commands: {}",
        CommandTable::builtin().names().join(", ")
    );
}

async fn run_command<R: Runtime + 'static>(runtime: &R, cli: &Cli, argv: &[String]) -> i32 {
    let Some((name, args)) = argv.split_first() else {
        print_help();
        return 0;
    };

    info!("pluck {}", pluck::VERSION);
    if runtime.is_privileged() {
        warn!("Running pluck with root/administrator privileges is not recommended.");
    }

    let result = match cli.config(runtime) {
        Ok(config) => dispatch::run(runtime, &config, name, args).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            if let Some(clap_error) = e.downcast_ref::<clap::Error>() {
                clap_error.exit();
            }
            error!("{:#}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();
    let runtime = RealRuntime;

    let code = match &cli.command {
        Some(Commands::Run(args)) => run_entry_stub(
            &ProgramLoader::new(&runtime),
            &args.entry,
            &args.context,
            &runtime_version(),
        ),
        Some(Commands::External(argv)) => run_command(&runtime, &cli, argv).await,
        None => {
            print_help();
            0
        }
    };

    std::process::exit(code);
}
