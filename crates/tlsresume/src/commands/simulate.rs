//! Simulate command - drive a session context with synthetic handshakes.
//!
//! Each handshake targets one of `--peers` servers. The client side first
//! looks for a session it can offer for that peer; if the server side still
//! knows the id, the handshake counts as resumed. Otherwise a full handshake
//! negotiates a fresh 32-byte session that both sides store.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use tlsresume_cache::{
    CacheStats, FileSessionStore, NoPersistence, PersistenceHook, Session, SessionContext,
    SessionId,
};

use super::Context;

const CIPHER_SUITES: &[&str] = &[
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
];

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of handshakes to run
    #[arg(long, default_value_t = 1000)]
    pub handshakes: usize,

    /// Number of distinct peers (host:port pairs)
    #[arg(long, default_value_t = 50)]
    pub peers: u16,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    /// Override the client cache size
    #[arg(long, allow_negative_numbers = true)]
    pub client_size: Option<i64>,

    /// Override the server cache size
    #[arg(long, allow_negative_numbers = true)]
    pub server_size: Option<i64>,

    /// Override the session timeout (seconds, 0 = never expire) on both sides
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Persist client sessions to this directory
    #[arg(long)]
    pub persist_dir: Option<PathBuf>,
}

/// Outcome of a simulation run.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub handshakes: usize,
    pub full: u64,
    pub resumed: u64,
    /// Client offered a session the server no longer had.
    pub rejected: u64,
    pub elapsed_ms: u128,
    pub client: CacheStats,
    pub server: CacheStats,
}

#[derive(Default)]
struct Tally {
    full: AtomicU64,
    resumed: AtomicU64,
    rejected: AtomicU64,
}

type Ctx = SessionContext<Box<dyn PersistenceHook>>;

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    anyhow::ensure!(args.peers > 0, "--peers must be at least 1");
    anyhow::ensure!(args.workers > 0, "--workers must be at least 1");

    let sessions = Arc::new(build_context(&args, ctx)?);
    let tally = Arc::new(Tally::default());
    let next = Arc::new(AtomicUsize::new(0));

    info!(
        handshakes = args.handshakes,
        peers = args.peers,
        workers = args.workers,
        client_size = sessions.client().cache_size(),
        server_size = sessions.server().cache_size(),
        "Starting simulation"
    );

    let started = Instant::now();
    let mut handles = Vec::with_capacity(args.workers);
    for _ in 0..args.workers {
        let sessions = Arc::clone(&sessions);
        let tally = Arc::clone(&tally);
        let next = Arc::clone(&next);
        let (total, peers) = (args.handshakes, args.peers);

        handles.push(tokio::spawn(async move {
            loop {
                let n = next.fetch_add(1, Ordering::Relaxed);
                if n >= total {
                    break;
                }
                handshake(&sessions, &tally, n, peers)?;
                tokio::task::yield_now().await;
            }
            anyhow::Ok(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let summary = Summary {
        handshakes: args.handshakes,
        full: tally.full.load(Ordering::Relaxed),
        resumed: tally.resumed.load(Ordering::Relaxed),
        rejected: tally.rejected.load(Ordering::Relaxed),
        elapsed_ms: started.elapsed().as_millis(),
        client: sessions.client().stats(),
        server: sessions.server().stats(),
    };

    info!(
        full = summary.full,
        resumed = summary.resumed,
        rejected = summary.rejected,
        "Simulation finished"
    );
    print_summary(&summary, ctx)
}

fn build_context(args: &SimulateArgs, ctx: &Context) -> Result<Ctx> {
    let config = &ctx.loaded.config;
    let client = config.client_cache()?;
    let server = config.server_cache()?;

    let persist_dir = args
        .persist_dir
        .clone()
        .or_else(|| config.client.as_ref().and_then(|c| c.persist_dir.clone()));

    let persistence: Box<dyn PersistenceHook> = match persist_dir {
        Some(dir) => {
            let mut store = FileSessionStore::open(&dir)
                .with_context(|| format!("failed to open session store {}", dir.display()))?;
            if let Some(max) = config.client.as_ref().and_then(|c| c.persist_max_files) {
                store = store.with_max_files(max);
            }
            debug!(dir = %dir.display(), "Persisting client sessions");
            Box::new(store)
        }
        None => Box::new(NoPersistence),
    };

    let sessions = SessionContext::with_client_persistence(client, server, persistence);

    if let Some(size) = args.client_size {
        sessions.client().set_cache_size(size).context("--client-size")?;
    }
    if let Some(size) = args.server_size {
        sessions.server().set_cache_size(size).context("--server-size")?;
    }
    if let Some(secs) = args.timeout {
        sessions.client().set_session_timeout(secs).context("--timeout")?;
        sessions.server().set_session_timeout(secs).context("--timeout")?;
    }

    Ok(sessions)
}

fn handshake(sessions: &Ctx, tally: &Tally, n: usize, peers: u16) -> Result<()> {
    let peer = (n % peers as usize) as u16;
    let host = format!("peer-{peer}.test");
    let port = 10_000 + peer;

    if let Some(offered) = sessions.client().lookup_by_peer(&host, port) {
        if sessions.server().lookup(Some(offered.id().as_bytes()))?.is_some() {
            tally.resumed.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        // Server forgot the session: abbreviated handshake falls back to full
        tally.rejected.fetch_add(1, Ordering::Relaxed);
    }

    let session = Session::new(new_session_id()?, Uuid::new_v4().as_bytes().to_vec())
        .with_protocol("TLSv1.2")
        .with_cipher_suite(CIPHER_SUITES[n % CIPHER_SUITES.len()])
        .with_peer(host, port);
    sessions.client().store(session.clone());
    sessions.server().store(session);
    tally.full.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

fn new_session_id() -> Result<SessionId> {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    Ok(SessionId::new(bytes)?)
}

fn print_summary(summary: &Summary, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Handshakes: {}", summary.handshakes);
    println!("  full:     {}", summary.full);
    println!("  resumed:  {}", summary.resumed);
    println!("  rejected: {}", summary.rejected);
    println!("  elapsed:  {} ms", summary.elapsed_ms);
    println!();
    for (name, stats) in [("client", &summary.client), ("server", &summary.server)] {
        println!("{name} cache:");
        println!("  size:        {}/{}", stats.size, stats.capacity);
        println!("  timeout:     {} s", stats.timeout_secs);
        println!("  hits:        {}", stats.hits);
        println!("  misses:      {}", stats.misses);
        println!("  evictions:   {}", stats.evictions);
        println!("  expirations: {}", stats.expirations);
    }
    Ok(())
}
