use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use ringkv::config::SimConfig;
use ringkv::membership::types::NodeId;
use ringkv::sim::audit::Outcome;
use ringkv::sim::cluster::Cluster;
use ringkv::storage::types::Operation;
use std::path::PathBuf;
use std::time::Duration;

/// Rounds between the phases of the CRUD workload.
const PHASE_GAP: u64 = 15;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut nodes: Option<usize> = None;
    let mut rounds: Option<u64> = None;
    let mut seed: Option<u64> = None;
    let mut drop_rate: Option<f64> = None;
    let mut tick_ms: Option<u64> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        let value = || {
            args.get(i + 1)
                .with_context(|| format!("{} needs a value", args[i]))
        };
        match args[i].as_str() {
            "--config" => {
                config_path = Some(PathBuf::from(value()?));
                i += 2;
            }
            "--nodes" => {
                nodes = Some(value()?.parse()?);
                i += 2;
            }
            "--rounds" => {
                rounds = Some(value()?.parse()?);
                i += 2;
            }
            "--seed" => {
                seed = Some(value()?.parse()?);
                i += 2;
            }
            "--drop-rate" => {
                drop_rate = Some(value()?.parse()?);
                i += 2;
            }
            "--tick-ms" => {
                tick_ms = Some(value()?.parse()?);
                i += 2;
            }
            "--verbose" => {
                verbose = true;
                i += 1;
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: {} [--config <file.json>] [--nodes N] [--rounds R] [--seed S] \
                     [--drop-rate P] [--tick-ms MS] [--verbose]",
                    args[0]
                );
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument {}", other);
                i += 1;
            }
        }
    }

    let mut config = match config_path {
        Some(path) => SimConfig::load(&path)?,
        None => SimConfig::default(),
    };
    if let Some(n) = nodes {
        config.nodes = n;
    }
    if let Some(r) = rounds {
        config.rounds = r;
    }
    if let Some(s) = seed {
        config.seed = s;
    }
    if let Some(p) = drop_rate {
        config.drop_rate = p;
    }
    if let Some(ms) = tick_ms {
        config.tick_ms = ms;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    tracing::info!(
        "Simulating {} nodes for {} rounds (seed={}, drop_rate={}, max_delay={})",
        config.nodes,
        config.rounds,
        config.seed,
        config.drop_rate,
        config.max_delay
    );

    let cluster = run(&config).await;
    report(&cluster, &config);

    Ok(())
}

async fn run(config: &SimConfig) -> Cluster {
    let mut cluster = Cluster::from_config(config);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let keys: Vec<String> = (0..config.keys).map(|k| format!("key-{}", k)).collect();

    let mut pacing = (config.tick_ms > 0)
        .then(|| tokio::time::interval(Duration::from_millis(config.tick_ms)));

    for round in 0..config.rounds {
        let started = cluster.nodes().len();
        if started < config.nodes && round >= started as u64 * config.join_interval {
            let id = cluster.add_node();
            if let Err(e) = cluster.start(id) {
                tracing::error!("Node {} did not boot: {}", id, e);
            }
        }

        if round >= config.workload_at {
            let phase = round - config.workload_at;
            if phase % PHASE_GAP == 0 {
                issue_phase(&mut cluster, &mut rng, &keys, phase / PHASE_GAP);
            }
        }

        if config.fail_at == Some(round) {
            fail_random(&mut cluster, &mut rng, config.fail_count);
        }

        if let Some(interval) = pacing.as_mut() {
            interval.tick().await;
        }
        cluster.run_round();
    }

    cluster
}

/// create → read → update → read → delete (first half of the keys).
fn issue_phase(cluster: &mut Cluster, rng: &mut StdRng, keys: &[String], phase: u64) {
    let live: Vec<NodeId> = cluster.live_nodes().map(|node| node.id()).collect();
    if live.is_empty() {
        return;
    }

    let mut issued = 0usize;
    for (k, key) in keys.iter().enumerate() {
        let Some(&at) = live.choose(rng) else {
            return;
        };
        let result = match phase {
            0 => cluster.create(at, key, &format!("value-{}", k)),
            1 | 3 => cluster.read(at, key),
            2 => cluster.update(at, key, &format!("value-{}-v2", k)),
            4 if k % 2 == 0 => cluster.delete(at, key),
            _ => continue,
        };
        match result {
            Ok(_) => issued += 1,
            Err(e) => tracing::warn!("Could not issue operation on {}: {}", at, e),
        }
    }

    if issued > 0 {
        tracing::info!("Workload phase {}: issued {} operations", phase, issued);
    }
}

fn fail_random(cluster: &mut Cluster, rng: &mut StdRng, count: usize) {
    let introducer = cluster.params().introducer;
    let candidates: Vec<NodeId> = cluster
        .live_nodes()
        .map(|node| node.id())
        .filter(|id| *id != introducer)
        .collect();

    for id in candidates.choose_multiple(rng, count) {
        tracing::info!("Failing node {}", id);
        cluster.fail(*id);
    }
}

fn report(cluster: &Cluster, config: &SimConfig) {
    tracing::info!("=== Final state at tick {} ===", cluster.now());

    for node in cluster.nodes() {
        tracing::info!(
            "  - {} status={:?} failed={} members={} ring={} keys={} pending={}",
            node.id(),
            node.status(),
            node.is_failed(),
            node.membership().table().len(),
            node.storage().ring().len(),
            node.storage().store().len(),
            node.storage().coordinator().pending_count()
        );
    }
    tracing::info!("Membership converged: {}", cluster.converged());

    let mut by_copies = [0usize; 5];
    for k in 0..config.keys {
        let copies = cluster.holders(&format!("key-{}", k)).len();
        by_copies[copies.min(4)] += 1;
    }
    tracing::info!(
        "Keys by live copies: 0={} 1={} 2={} 3={} 4+={}",
        by_copies[0],
        by_copies[1],
        by_copies[2],
        by_copies[3],
        by_copies[4]
    );

    let audit = cluster.audit();
    for op in [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ] {
        tracing::info!(
            "{}: {} succeeded, {} failed",
            op,
            audit.verdict_count(op, Outcome::Success),
            audit.verdict_count(op, Outcome::Failure)
        );
    }

    let net = cluster.network().total_stats();
    tracing::info!(
        "Network: {} sent, {} received, {} dropped",
        net.sent,
        net.received,
        net.dropped
    );
}
