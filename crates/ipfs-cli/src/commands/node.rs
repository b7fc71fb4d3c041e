//! Commands that run against a constructed node.

use serde::Serialize;

use super::{CommandError, Invocation};
use crate::server;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct IdReport<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    addresses: Vec<String>,
    agent_version: String,
}

pub(super) fn daemon(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    let node = invocation.node()?;
    writeln!(invocation.out, "Initializing daemon...")?;
    writeln!(invocation.out, "PeerID: {}", node.peer_id())?;
    server::run_daemon(node, &mut *invocation.out)?;
    Ok(())
}

pub(super) fn id(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    let node = invocation.node()?;
    let report = IdReport {
        id: node.peer_id(),
        addresses: vec![node.api_address().to_string()],
        agent_version: format!("ipfs/{}", env!("CARGO_PKG_VERSION")),
    };
    serde_json::to_writer_pretty(&mut *invocation.out, &report)?;
    writeln!(invocation.out)?;
    Ok(())
}

pub(super) fn peers(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    let node = invocation.node()?;
    for peer in node.peers() {
        writeln!(invocation.out, "{peer}")?;
    }
    Ok(())
}
