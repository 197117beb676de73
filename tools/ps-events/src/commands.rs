//! Subcommand implementations.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use ps_01_event_sync::adapters::pack_snapshots;
use ps_01_event_sync::{
    snapshot_status, verify_snapshots, CollectionStatus, HttpSourceFactory, NetworksConfig,
    SnapshotSync, SyncConfig, SyncSelection,
};
use ps_telemetry::{encode_metrics, LAST_SYNCED_BLOCK};
use shared_types::NetworkId;
use tracing::info;

/// Load the networks file named on the command line or by the environment.
pub fn load_networks(explicit: Option<PathBuf>) -> Result<NetworksConfig> {
    let path = NetworksConfig::resolve_path(explicit)
        .context("no networks configuration: pass --config or set PS_NETWORKS_CONFIG")?;
    NetworksConfig::load(&path)
        .with_context(|| format!("loading networks configuration {}", path.display()))
}

pub async fn sync(
    networks: NetworksConfig,
    dir: &Path,
    network_id: NetworkId,
    filters: &[String],
) -> Result<String> {
    let config = SyncConfig::default();
    let factory = Arc::new(HttpSourceFactory::new(config.clone()));
    let selection = SyncSelection::from_args(filters);
    info!(network_id, ?selection, dir = %dir.display(), "Syncing snapshots");

    let reports = SnapshotSync::new(networks, config, factory, dir)
        .sync_network(network_id, &selection)
        .await
        .with_context(|| format!("syncing network {network_id}"))?;

    let mut out = String::new();
    for report in reports {
        writeln!(
            out,
            "{}: {} -> {} events, lastBlock {}",
            report.collection, report.before, report.after, report.last_block
        )?;
    }
    Ok(out)
}

pub async fn verify(dir: &Path) -> Result<String> {
    let reports = verify_snapshots(dir)
        .await
        .with_context(|| format!("verifying snapshots in {}", dir.display()))?;

    let mut out = String::new();
    for report in &reports {
        writeln!(out, "ok {} ({} events)", report.file, report.events)?;
    }
    writeln!(out, "{} snapshot(s) verified", reports.len())?;
    Ok(out)
}

pub async fn status(
    networks: &NetworksConfig,
    dir: &Path,
    network_ids: &[NetworkId],
    metrics: bool,
    json: bool,
) -> Result<String> {
    let statuses = snapshot_status(dir, networks, network_ids)
        .await
        .with_context(|| format!("reading snapshots in {}", dir.display()))?;

    for status in &statuses {
        if let Some(block) = status.last_block {
            LAST_SYNCED_BLOCK
                .with_label_values(&[status.collection.as_str()])
                .set(block as f64);
        }
    }

    let mut out = if json {
        serde_json::to_string_pretty(&statuses)? + "\n"
    } else {
        render_table(&statuses)?
    };
    if metrics {
        out.push_str(&encode_metrics()?);
    }
    Ok(out)
}

pub async fn pack(dir: &Path) -> Result<String> {
    let packed = pack_snapshots(dir)
        .await
        .with_context(|| format!("packing snapshots in {}", dir.display()))?;

    let mut out = String::new();
    for path in &packed {
        writeln!(out, "packed {}", path.display())?;
    }
    Ok(out)
}

fn render_table(statuses: &[CollectionStatus]) -> Result<String> {
    let width = statuses
        .iter()
        .map(|s| s.collection.len())
        .max()
        .unwrap_or(0)
        .max("COLLECTION".len());

    let mut out = String::new();
    writeln!(out, "{:<width$}  {:>8}  {:>10}", "COLLECTION", "EVENTS", "LAST BLOCK")?;
    for status in statuses {
        let last_block = status
            .last_block
            .map_or_else(|| "-".to_string(), |b| b.to_string());
        writeln!(
            out,
            "{:<width$}  {:>8}  {:>10}",
            status.collection, status.events, last_block
        )?;
    }
    Ok(out)
}
