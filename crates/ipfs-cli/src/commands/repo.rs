//! Commands that read or change the repository on disk.

use std::env;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::Utf8Path;
use ipfs_config::{RepoConfig, RepoPaths};
use sha2::{Digest, Sha256};
use tracing::info;

use super::{CommandError, Invocation};

const COMMANDS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commands");

pub(super) fn init(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    let repo = invocation.env.repo();
    let config = initialise_repo(repo)?;
    writeln!(invocation.out, "initializing IPFS node at {}", repo.root())?;
    writeln!(invocation.out, "peer identity: {}", config.identity.peer_id)?;
    Ok(())
}

fn initialise_repo(repo: &RepoPaths) -> Result<RepoConfig, CommandError> {
    if repo.is_initialized() {
        return Err(CommandError::AlreadyInitialised {
            root: repo.root().to_string(),
        });
    }
    let config = RepoConfig::new(generate_peer_id(repo.root()));
    repo.save_config(&config)?;
    info!(
        target: COMMANDS_TARGET,
        repo = %repo.root(),
        peer = %config.identity.peer_id,
        "repository initialised"
    );
    Ok(config)
}

/// Derives a fresh identifier from the repository root and the current time.
fn generate_peer_id(root: &Utf8Path) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(root.as_str().as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    format!("Qm{:x}", hasher.finalize())
}

pub(super) fn show(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    let config = invocation.env.repo().load_config()?;
    writeln!(invocation.out, "{}", config.to_json_pretty()?)?;
    Ok(())
}

pub(super) fn edit(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    let editor = env::var("EDITOR").ok();
    edit_with(editor.as_deref(), invocation.env.repo().config_path())
}

/// Runs `editor` on `path` and waits for it. The editor value may carry its
/// own arguments, as in `code --wait`.
fn edit_with(editor: Option<&str>, path: &Utf8Path) -> Result<(), CommandError> {
    let mut words = editor.unwrap_or_default().split_whitespace();
    let Some(program) = words.next() else {
        return Err(CommandError::NoEditor);
    };
    let status = Command::new(program)
        .args(words)
        .arg(path.as_std_path())
        .status()
        .map_err(|source| CommandError::EditorSpawn {
            editor: program.to_owned(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(CommandError::EditorFailed {
            editor: program.to_owned(),
            status: status.to_string(),
        })
    }
}

pub(super) fn fsck(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    let repo = invocation.env.repo();
    if repo.remove_api_address()? {
        writeln!(invocation.out, "Removed stale API record {}", repo.api_path())?;
    } else {
        writeln!(invocation.out, "No stale API record found")?;
    }
    Ok(())
}
