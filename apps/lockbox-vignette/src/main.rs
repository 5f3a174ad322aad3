use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use clap::Parser;
use lockbox_background::{
    BackgroundHub, BusConfig, ConfigSnapshot, TabHost, TabHostError, TabId, TabNavigation,
    TabWatcher, watch_config,
};
use lockbox_client_core::{DeliveryPolicy, UiContext};
use lockbox_state::{AuthProvider, StateTree, actions, selectors};
use serde_json::{Value, json};
use tracing::info;

const CONTEXT_NAMES: [&str; 4] = ["dialog", "popup", "setup", "vault"];

#[derive(Parser, Debug)]
struct Args {
    /// Number of UI contexts to attach.
    #[arg(long, default_value_t = 2)]
    contexts: usize,

    /// Pending auth id registered for both providers before replaying navigations.
    #[arg(long, default_value = "vignette-attempt")]
    auth_id: String,

    /// Tab URL to replay, in order. Repeatable.
    #[arg(long = "navigate", value_name = "URL")]
    navigations: Vec<String>,

    /// Persisted config entry fed through the config watcher. Repeatable.
    #[arg(long = "config", value_name = "KEY=VALUE")]
    config: Vec<String>,

    /// How long to wait for replicas to converge.
    #[arg(long, default_value_t = 2_000)]
    settle_ms: u64,

    /// Output directory. Defaults to `output/vignettes/lockbox-bus/<run_id>`.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

/// Tab host that only records which tabs it was asked to close.
#[derive(Clone, Default)]
struct RecordingTabs {
    closed: Arc<Mutex<Vec<TabId>>>,
}

impl RecordingTabs {
    fn closed(&self) -> Vec<TabId> {
        self.closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TabHost for RecordingTabs {
    async fn remove_tab(&self, tab_id: TabId) -> Result<(), TabHostError> {
        info!(tab_id, "closing capture tab");
        self.closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tab_id);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.contexts == 0 {
        bail!("--contexts must be at least 1");
    }
    let run_id = uuid::Uuid::now_v7().to_string();
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("output/vignettes/lockbox-bus/{run_id}")));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("create output dir {}", output_dir.display()))?;

    let bus_config = BusConfig::from_env().context("resolve bus config")?;
    let policy = DeliveryPolicy::from_env().context("resolve delivery policy")?;
    let settle = Duration::from_millis(args.settle_ms);

    let (handle, hub_task) = BackgroundHub::new(StateTree::default()).spawn();

    let mut contexts = Vec::with_capacity(args.contexts);
    for index in 0..args.contexts {
        let name = context_name(index);
        let context = UiContext::connect(&handle, &name, policy)
            .with_context(|| format!("connect ui context {name}"))?;
        contexts.push(context);
    }
    let mut events = Vec::<Value>::new();
    events.push(json!({ "step": "contexts_connected", "count": contexts.len(), "policy": policy.label() }));

    let snapshot = parse_config_entries(&args.config)?;
    if !snapshot.is_empty() {
        let queued = watch_config(handle.clone(), futures::stream::iter(vec![snapshot])).await;
        events.push(json!({ "step": "config_applied", "snapshots": queued }));
    }

    // The first context starts an auth attempt for every provider, the way the
    // setup page does before opening the provider's login tab.
    let initiator = contexts
        .first()
        .ok_or_else(|| anyhow!("no ui context attached"))?;
    for provider in AuthProvider::ALL {
        let delivery = initiator
            .dispatch(actions::set_auth_id(provider, args.auth_id.clone()))
            .await
            .with_context(|| format!("relay {} auth id", provider.label()))?;
        events.push(json!({ "step": "auth_pending", "provider": provider.label(), "delivery": format!("{delivery:?}") }));
    }
    initiator
        .wait_for(settle, |state| {
            AuthProvider::ALL
                .iter()
                .all(|provider| selectors::is_awaiting_token(state, *provider))
        })
        .await
        .context("auth attempts did not reach the initiator replica")?;

    let navigations = if args.navigations.is_empty() {
        vec![format!(
            "{}oauth?access_token=vignette-dropbox-token",
            bus_config.dropbox_redirect_prefix
        )]
    } else {
        args.navigations.clone()
    };
    let tabs = RecordingTabs::default();
    let watcher = TabWatcher::from_config(&bus_config, handle.clone(), tabs.clone())
        .context("build tab watcher")?;
    let stream = futures::stream::iter(
        navigations
            .iter()
            .enumerate()
            .map(|(index, url)| TabNavigation::new(index as TabId + 1, url.clone()))
            .collect::<Vec<_>>(),
    );
    let summary = watcher.run(stream).await;
    info!(?summary, "navigations replayed");
    events.push(json!({
        "step": "navigations_replayed",
        "seen": summary.seen,
        "captured": summary.captured,
        "rejected": summary.rejected,
        "malformed": summary.malformed,
        "duplicates": summary.duplicates,
        "closed_tabs": tabs.closed(),
    }));

    // Attempts no navigation answered are abandoned, as the setup page does
    // when its login tab is closed without a redirect.
    let pending = handle.snapshot().await.context("read background state")?;
    for provider in AuthProvider::ALL {
        if !selectors::is_awaiting_token(&pending, provider) {
            continue;
        }
        let delivery = initiator
            .cancel_auth(provider)
            .await
            .with_context(|| format!("cancel {} auth attempt", provider.label()))?;
        events.push(json!({ "step": "auth_cancelled", "provider": provider.label(), "delivery": format!("{delivery:?}") }));
    }
    initiator
        .wait_for(settle, |state| {
            AuthProvider::ALL
                .iter()
                .all(|provider| !selectors::is_awaiting_token(state, *provider))
        })
        .await
        .context("auth cancellations did not reach the initiator replica")?;

    let authoritative = handle.snapshot().await.context("read background state")?;
    let mut replicas = Vec::with_capacity(contexts.len());
    for context in &contexts {
        let state = context
            .wait_for(settle, |state| *state == authoritative)
            .await
            .with_context(|| format!("replica {} did not converge", context.name()))?;
        replicas.push(json!({ "context": context.name(), "converged": state == authoritative }));
    }
    let status = handle.status().await.context("read hub status")?;
    info!(
        version = status.version,
        ports = status.ports.len(),
        full_state_pushes = status.stats.full_state_pushes,
        "replicas converged"
    );

    let report = json!({
        "run_id": run_id,
        "events": events,
        "replicas": replicas,
        "hub": {
            "version": status.version,
            "ports": status.ports.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "full_state_pushes": status.stats.full_state_pushes,
            "action_relays": status.stats.action_relays,
            "failed_deliveries": status.stats.failed_deliveries,
        },
        "state": serde_json::to_value(&authoritative).context("encode final state")?,
    });
    let report_path = output_dir.join("summary.json");
    std::fs::write(
        &report_path,
        serde_json::to_vec_pretty(&report).context("encode summary")?,
    )
    .with_context(|| format!("write {}", report_path.display()))?;
    info!(path = %report_path.display(), "vignette summary written");

    for context in contexts {
        context.disconnect();
    }
    handle.shutdown();
    hub_task.await.context("join background hub")?;
    info!(hub_running = handle.is_running(), "vignette finished");
    Ok(())
}

fn context_name(index: usize) -> String {
    let base = CONTEXT_NAMES[index % CONTEXT_NAMES.len()];
    if index < CONTEXT_NAMES.len() {
        base.to_string()
    } else {
        format!("{base}-{}", index / CONTEXT_NAMES.len())
    }
}

/// `KEY=VALUE` pairs; values that parse as JSON keep their type, anything
/// else is stored as a string.
fn parse_config_entries(entries: &[String]) -> Result<ConfigSnapshot> {
    let mut snapshot = BTreeMap::new();
    for entry in entries {
        let (key, raw) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("config entry {entry:?} is not KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("config entry {entry:?} has an empty key");
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        snapshot.insert(key.to_string(), value);
    }
    Ok(snapshot)
}
