//! Test support utilities for CLI runtime coverage.
//!
//! Supplies temporary repositories, a fake daemon API, and a world type that
//! runs the CLI with captured output so step definitions and unit tests stay
//! focused on their assertions.


use std::cell::RefCell;
use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use ipfs_config::{Config, Multiaddr, RepoConfig, RepoPaths};
use rstest::fixture;
use tempfile::TempDir;

use crate::{AppError, ConfigLoader, IoStreams, run_with_loader};

pub(super) use fake_daemon::{CannedResponse, FakeDaemon, unreachable_address};

/// Identity written into test repositories.
pub(super) const TEST_PEER_ID: &str = "QmTestPeer";
/// Peer listed in test repositories.
pub(super) const TEST_PEER: &str = "/ip4/10.0.0.1/tcp/4001";

/// A config loader that returns a fixed configuration.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// A config loader that panics if called.
pub(super) struct PanickingLoader;

impl ConfigLoader for PanickingLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        panic!("configuration must not be loaded for this invocation");
    }
}

/// A repository root inside a temporary directory.
pub(super) struct TempRepo {
    _dir: TempDir,
    paths: RepoPaths,
}

impl TempRepo {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("create temp dir")?;
        let root = Utf8PathBuf::from_path_buf(dir.path().join("repo"))
            .map_err(|path| anyhow::anyhow!("non UTF-8 temp path {}", path.display()))?;
        Ok(Self {
            _dir: dir,
            paths: RepoPaths::new(root),
        })
    }

    pub fn paths(&self) -> &RepoPaths {
        &self.paths
    }

    /// Writes a configuration with a known identity and one peer.
    pub fn initialise(&self) -> Result<()> {
        self.initialise_with_api("/ip4/127.0.0.1/tcp/5001")
    }

    pub fn initialise_with_api(&self, api: &str) -> Result<()> {
        let mut config = RepoConfig::new(TEST_PEER_ID);
        config.addresses.api = api.parse::<Multiaddr>().context("parse api address")?;
        config.peering.peers = vec![TEST_PEER.parse::<Multiaddr>().context("parse peer")?];
        self.paths.save_config(&config).context("save config")
    }

    /// Writes the discovery record a daemon would leave.
    pub fn advertise(&self, address: &Multiaddr) -> Result<()> {
        self.paths
            .write_api_address(address)
            .context("write api record")
    }
}

/// Captured output of one CLI run.
#[derive(Debug, Default)]
pub(super) struct RunOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<ExitCode>,
}

impl RunOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs the CLI with `args` against a static default configuration.
pub(super) fn run_cli<I, S>(args: I) -> RunOutput
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let loader = StaticConfigLoader::new(Config::default());
    let mut output = RunOutput::default();
    let mut io = IoStreams::new(&mut output.stdout, &mut output.stderr);
    let exit = run_with_loader(args, &mut io, &loader);
    output.exit_code = Some(exit);
    output
}

/// Test world holding a repository, an optional fake daemon, and the last run.
pub(super) struct TestWorld {
    pub repo: TempRepo,
    pub daemon: Option<FakeDaemon>,
    pub explicit_api: Option<String>,
    pub output: RunOutput,
    pub requests: Vec<String>,
}

impl TestWorld {
    pub fn new() -> Result<Self> {
        Ok(Self {
            repo: TempRepo::new()?,
            daemon: None,
            explicit_api: None,
            output: RunOutput::default(),
            requests: Vec::new(),
        })
    }

    /// Starts a fake daemon and advertises it in the repository.
    pub fn start_daemon(&mut self, response: CannedResponse) -> Result<()> {
        let daemon = FakeDaemon::spawn(response)?;
        self.repo.advertise(&daemon.multiaddr())?;
        self.daemon = Some(daemon);
        Ok(())
    }

    /// Advertises an address on which no daemon listens.
    pub fn advertise_dead_daemon(&mut self) -> Result<()> {
        self.repo.advertise(&unreachable_address()?)
    }

    /// Runs `command` against the world's repository.
    pub fn run(&mut self, command: &str) -> Result<()> {
        let mut args: Vec<OsString> = vec![OsString::from("ipfs")];
        args.extend(command.split_whitespace().map(OsString::from));
        args.push(OsString::from("--config"));
        args.push(OsString::from(self.repo.paths().root().as_str()));
        if let Some(api) = &self.explicit_api {
            args.push(OsString::from("--api"));
            args.push(OsString::from(api));
        }
        self.output = run_cli(args);
        if let Some(daemon) = self.daemon.as_mut() {
            self.requests = daemon.take_requests()?;
        }
        Ok(())
    }

    pub fn stdout_text(&self) -> String {
        self.output.stdout_text()
    }

    pub fn stderr_text(&self) -> String {
        self.output.stderr_text()
    }

    pub fn exit_code(&self) -> Option<ExitCode> {
        self.output.exit_code
    }
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new().expect("create test world"))
}
