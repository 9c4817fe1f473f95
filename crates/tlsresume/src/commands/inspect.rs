//! Inspect command - list sessions persisted by the client cache.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use tlsresume_cache::{FileSessionStore, PeerKey, Session, SessionId};

use super::Context;

/// Arguments for the inspect command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Session directory (default: [client] persist_dir from config)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

/// Listing entry. The negotiated state is secret and never printed.
#[derive(Debug, Serialize)]
struct SessionSummary<'a> {
    id: &'a SessionId,
    peer: Option<&'a PeerKey>,
    protocol: &'a str,
    cipher_suite: &'a str,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a Session> for SessionSummary<'a> {
    fn from(session: &'a Session) -> Self {
        Self {
            id: session.id(),
            peer: session.peer(),
            protocol: session.protocol(),
            cipher_suite: session.cipher_suite(),
            created_at: session.created_at(),
        }
    }
}

/// Run the inspect command.
pub async fn run(args: InspectArgs, ctx: &Context) -> Result<()> {
    let dir = args
        .dir
        .or_else(|| {
            ctx.loaded
                .config
                .client
                .as_ref()
                .and_then(|c| c.persist_dir.clone())
        })
        .ok_or_else(|| {
            anyhow::anyhow!("No session directory given and [client] persist_dir is not set")
        })?;

    let store = FileSessionStore::open(&dir)?;
    let sessions = store.list()?;

    if ctx.json_output {
        let summaries: Vec<SessionSummary<'_>> = sessions.iter().map(SessionSummary::from).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions in {}", dir.display());
        return Ok(());
    }

    println!("{} session(s) in {}\n", sessions.len(), dir.display());
    for session in &sessions {
        let peer = session
            .peer()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {}  {}", session.id(), peer);
        if ctx.verbose {
            println!("      protocol:     {}", session.protocol());
            println!("      cipher suite: {}", session.cipher_suite());
            println!("      created:      {}", session.created_at().to_rfc3339());
        }
    }

    Ok(())
}
