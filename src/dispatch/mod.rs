//! Command name in, exit code out.
//!
//! The [`Dispatcher`] looks the command up in the [`CommandTable`], makes sure
//! a local copy of its package exists, finds the package entry point and runs
//! it in a child process through the `__run` entry stub. The child's exit code
//! is returned unchanged.

mod launcher;
mod table;

use anyhow::Result;
use log::debug;
use std::ffi::OsString;
use std::path::Path;

use crate::archive::TarGzExtractor;
use crate::config::Config;
use crate::error::EngineError;
use crate::http::HttpClient;
use crate::install::{Installer, RegistryInstaller};
use crate::lifecycle::{InvocationContext, runtime_version};
use crate::package::{PackageHandle, VersionResolver};
use crate::registry::{NpmRegistry, Registry};
use crate::runtime::Runtime;
use crate::update_check::check_for_update;

pub use launcher::{LaunchSpec, ProcessLauncher, TokioLauncher, exit_code};
pub use table::{CommandSpec, CommandTable, Flag, Positional};

/// Hidden subcommand the host relaunches itself with to run an entry file.
pub const STUB_COMMAND: &str = "__run";

/// Log filter handed down to the entry stub.
pub const LOG_LEVEL_ENV: &str = "PLUCK_LOG_LEVEL";

pub struct Dispatcher<'a, R: Runtime> {
    runtime: &'a R,
    config: &'a Config,
    table: &'a CommandTable,
    registry: &'a dyn Registry,
    installer: &'a dyn Installer,
    launcher: &'a dyn ProcessLauncher,
}

impl<'a, R: Runtime> Dispatcher<'a, R> {
    pub fn new(
        runtime: &'a R,
        config: &'a Config,
        table: &'a CommandTable,
        registry: &'a dyn Registry,
        installer: &'a dyn Installer,
        launcher: &'a dyn ProcessLauncher,
    ) -> Self {
        Self {
            runtime,
            config,
            table,
            registry,
            installer,
            launcher,
        }
    }

    /// Run command `name` with `argv` (the arguments after the name).
    #[tracing::instrument(skip(self))]
    pub async fn dispatch(&self, name: &str, argv: &[String]) -> Result<i32> {
        let spec = self.table.get(name)?;
        let ctx = spec.parse(argv)?;

        let mut handle = self.handle_for(spec);
        let present = handle.exists().await?;
        if handle.is_local() {
            if !present {
                return Err(EngineError::EntryNotFound {
                    package: handle.name().to_string(),
                    searched: handle.target_path().to_path_buf(),
                }
                .into());
            }
        } else if present {
            handle.update().await?;
        } else {
            handle.install().await?;
        }

        let Some(entry) = handle.root_file_path()? else {
            return Err(EngineError::EntryNotFound {
                package: handle.name().to_string(),
                searched: handle
                    .cache_file_path()
                    .unwrap_or_else(|| handle.target_path().to_path_buf()),
            }
            .into());
        };

        debug!("Launching {}@{} from {:?}", handle.name(), handle.version(), entry);
        let code = self.launcher.launch(&self.stub_launch(&entry, &ctx)?).await?;
        if code != 0 {
            // The stub has already reported the failure.
            debug!("Command {} exited with code {}", name, code);
        }
        Ok(code)
    }

    fn handle_for(&self, spec: &CommandSpec) -> PackageHandle<'a, R> {
        match &self.config.target_path {
            Some(target_path) => {
                PackageHandle::local(self.runtime, spec.package_spec(), target_path.clone())
            }
            None => PackageHandle::registry(
                self.runtime,
                spec.package_spec(),
                self.config.dependencies_dir(),
                self.config.store_dir(),
                VersionResolver::new(self.registry),
                self.installer,
            ),
        }
    }

    fn stub_launch(&self, entry: &Path, ctx: &InvocationContext) -> Result<LaunchSpec> {
        Ok(LaunchSpec {
            program: self.runtime.current_exe()?,
            args: vec![
                OsString::from(STUB_COMMAND),
                entry.as_os_str().to_os_string(),
                OsString::from("--context"),
                OsString::from(ctx.to_json()?),
            ],
            cwd: self.runtime.current_dir()?,
            env: vec![(
                LOG_LEVEL_ENV.to_string(),
                self.config.effective_log_level().to_string(),
            )],
        })
    }
}

/// Dispatch with the real registry, installer and process launcher.
pub async fn run<R: Runtime + 'static>(
    runtime: &R,
    config: &Config,
    name: &str,
    argv: &[String],
) -> Result<i32> {
    let table = CommandTable::builtin();
    table.get(name)?;

    let http_client = HttpClient::build(config.query_timeout)?;
    let registry = NpmRegistry::new(http_client.clone(), &config.registry);

    if config.update_check {
        check_for_update(&VersionResolver::new(&registry), &runtime_version()).await;
    }

    let installer = RegistryInstaller::new(runtime, http_client, TarGzExtractor);
    Dispatcher::new(runtime, config, &table, &registry, &installer, &TokioLauncher)
        .dispatch(name, argv)
        .await
}

#[cfg(test)]
mod tests {
    use super::launcher::MockProcessLauncher;
    use super::*;
    use crate::error::engine_error;
    use crate::install::{MockInstaller, PackageRequest};
    use crate::package::cache::cache_location;
    use crate::registry::{MockRegistry, PackageDocument, VersionDocument};
    use crate::runtime::{MockRuntime, RealRuntime, format_path};
    use anyhow::anyhow;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    const PACKAGE: &str = "@pluck-cli/init";

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn registry_with(versions: &'static [&'static str]) -> MockRegistry {
        let mut registry = MockRegistry::new();
        registry.expect_url().return_const("https://registry.test".to_string());
        registry.expect_package().returning(move |_| {
            Ok(PackageDocument {
                name: Some(PACKAGE.to_string()),
                versions: versions
                    .iter()
                    .map(|v| (v.to_string(), VersionDocument::default()))
                    .collect(),
            })
        });
        registry
    }

    fn write_package(dir: &Path, manifest: &str) {
        std::fs::create_dir_all(dir.join("lib")).unwrap();
        std::fs::write(dir.join("package.json"), manifest).unwrap();
        std::fs::write(dir.join("lib/index.js"), "").unwrap();
    }

    struct Fixture {
        _home: TempDir,
        config: Config,
        table: CommandTable,
    }

    impl Fixture {
        fn new() -> Self {
            let home = tempdir().unwrap();
            let mut config = Config::new(home.path().to_path_buf());
            config.update_check = false;
            Self {
                _home: home,
                config,
                table: CommandTable::builtin(),
            }
        }

        fn cache(&self, version: &str) -> PathBuf {
            cache_location(&self.config.store_dir(), PACKAGE, version)
        }

        async fn dispatch(
            &self,
            registry: &MockRegistry,
            installer: &MockInstaller,
            launcher: &MockProcessLauncher,
            name: &str,
            args: &[&str],
        ) -> Result<i32> {
            Dispatcher::new(
                &RealRuntime,
                &self.config,
                &self.table,
                registry,
                installer,
                launcher,
            )
            .dispatch(name, &argv(args))
            .await
        }
    }

    #[tokio::test]
    async fn test_unknown_command_touches_nothing() {
        let config = Config::new(PathBuf::from("/nonexistent"));
        let table = CommandTable::builtin();
        // Strict mocks: any call panics.
        let runtime = MockRuntime::new();
        let registry = MockRegistry::new();
        let installer = MockInstaller::new();
        let launcher = MockProcessLauncher::new();

        let err = Dispatcher::new(&runtime, &config, &table, &registry, &installer, &launcher)
            .dispatch("deploy", &[])
            .await
            .unwrap_err();

        match engine_error(&err) {
            Some(EngineError::UnknownCommand { name, available }) => {
                assert_eq!(name, "deploy");
                assert_eq!(available, "init");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_installs_latest_and_launches_stub() {
        let fixture = Fixture::new();
        let registry = registry_with(&["1.0.0", "1.2.0", "1.1.0"]);

        let mut installer = MockInstaller::new();
        installer
            .expect_install()
            .withf(|_, _, _, packages| packages == [PackageRequest::new(PACKAGE, "1.2.0")])
            .times(1)
            .returning(|_, store, _, packages| {
                let package = &packages[0];
                write_package(
                    &cache_location(store, &package.name, &package.version),
                    r#"{"main": "lib/index.js"}"#,
                );
                Ok(())
            });

        let expected_entry = format_path(&fixture.cache("1.2.0").join("lib/index.js"));
        let expected_cwd = std::env::current_dir().unwrap();
        let mut launcher = MockProcessLauncher::new();
        launcher
            .expect_launch()
            .withf(move |spec| {
                spec.args
                    == vec![
                        OsString::from("__run"),
                        expected_entry.clone().into_os_string(),
                        OsString::from("--context"),
                        OsString::from(
                            r#"["my-app",{"name":"init","package":"@pluck-cli/init"},{"force":true}]"#,
                        ),
                    ]
                    && spec.cwd == expected_cwd
                    && spec.env == vec![("PLUCK_LOG_LEVEL".to_string(), "info".to_string())]
            })
            .times(1)
            .returning(|_| Ok(0));

        let code = fixture
            .dispatch(&registry, &installer, &launcher, "init", &["my-app", "--force"])
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_cached_package_is_not_reinstalled() {
        let fixture = Fixture::new();
        write_package(&fixture.cache("1.2.0"), r#"{"main": "lib/index.js"}"#);
        let registry = registry_with(&["1.0.0", "1.2.0", "1.1.0"]);
        let mut installer = MockInstaller::new();
        installer.expect_install().never();
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_launch().times(1).returning(|_| Ok(0));

        let code = fixture
            .dispatch(&registry, &installer, &launcher, "init", &[])
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_child_exit_code_propagates() {
        let fixture = Fixture::new();
        write_package(&fixture.cache("1.0.0"), r#"{"main": "lib/index.js"}"#);
        let registry = registry_with(&["1.0.0"]);
        let installer = MockInstaller::new();
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_launch().returning(|_| Ok(1));

        let code = fixture
            .dispatch(&registry, &installer, &launcher, "init", &["my-app"])
            .await
            .unwrap();
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_missing_main_is_entry_not_found_without_spawn() {
        let fixture = Fixture::new();
        write_package(&fixture.cache("1.0.0"), r#"{"name": "@pluck-cli/init"}"#);
        let registry = registry_with(&["1.0.0"]);
        let installer = MockInstaller::new();
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_launch().never();

        let err = fixture
            .dispatch(&registry, &installer, &launcher, "init", &[])
            .await
            .unwrap_err();

        match engine_error(&err) {
            Some(EngineError::EntryNotFound { package, searched }) => {
                assert_eq!(package, PACKAGE);
                assert_eq!(searched, &fixture.cache("1.0.0"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let fixture = Fixture::new();
        write_package(&fixture.cache("1.0.0"), r#"{"main": "lib/index.js"}"#);
        let registry = registry_with(&["1.0.0"]);
        let installer = MockInstaller::new();
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_launch().returning(|spec| {
            Err(EngineError::SpawnFailed {
                program: spec.program.clone(),
                reason: "permission denied".into(),
            }
            .into())
        });

        let err = fixture
            .dispatch(&registry, &installer, &launcher, "init", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            engine_error(&err),
            Some(EngineError::SpawnFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_registry_failure_propagates() {
        let fixture = Fixture::new();
        let mut registry = MockRegistry::new();
        registry.expect_package().returning(|name| {
            Err(EngineError::registry(name, &anyhow!("operation timed out")).into())
        });
        let installer = MockInstaller::new();
        let launcher = MockProcessLauncher::new();

        let err = fixture
            .dispatch(&registry, &installer, &launcher, "init", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            engine_error(&err),
            Some(EngineError::RegistryUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_target_path_runs_local_package() {
        let mut fixture = Fixture::new();
        let local = tempdir().unwrap();
        write_package(local.path(), r#"{"main": "lib/index.js"}"#);
        fixture.config.target_path = Some(local.path().to_path_buf());
        fixture.config.debug = true;

        // No registry or installer traffic for a local package.
        let registry = MockRegistry::new();
        let installer = MockInstaller::new();
        let expected_entry = format_path(&local.path().join("lib/index.js")).into_os_string();
        let mut launcher = MockProcessLauncher::new();
        launcher
            .expect_launch()
            .withf(move |spec| {
                spec.args[1] == expected_entry
                    && spec.env == vec![("PLUCK_LOG_LEVEL".to_string(), "debug".to_string())]
            })
            .returning(|_| Ok(0));

        let code = fixture
            .dispatch(&registry, &installer, &launcher, "init", &[])
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_missing_target_path_does_not_fall_back_to_ancestor() {
        let mut fixture = Fixture::new();
        let parent = tempdir().unwrap();
        write_package(parent.path(), r#"{"main": "lib/index.js"}"#);
        let missing = parent.path().join("typo-does-not-exist");
        fixture.config.target_path = Some(missing.clone());

        let registry = MockRegistry::new();
        let installer = MockInstaller::new();
        let mut launcher = MockProcessLauncher::new();
        launcher.expect_launch().never();

        let err = fixture
            .dispatch(&registry, &installer, &launcher, "init", &[])
            .await
            .unwrap_err();

        match engine_error(&err) {
            Some(EngineError::EntryNotFound { package, searched }) => {
                assert_eq!(package, PACKAGE);
                assert_eq!(searched, &missing);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_rejects_unknown_command_before_registry_traffic() {
        let mut server = mockito::Server::new_async().await;
        let update_check = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut config = Config::new(PathBuf::from("/nonexistent"));
        config.registry = server.url();
        config.update_check = true;

        let err = run(&MockRuntime::new(), &config, "deploy", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            engine_error(&err),
            Some(EngineError::UnknownCommand { .. })
        ));
        update_check.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_arguments_are_clap_errors() {
        let fixture = Fixture::new();
        let registry = MockRegistry::new();
        let installer = MockInstaller::new();
        let launcher = MockProcessLauncher::new();

        let err = fixture
            .dispatch(&registry, &installer, &launcher, "init", &["--bogus"])
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<clap::Error>().is_some());
    }
}
