//! One render pass: fetch (or cache hit) → classify/aggregate → advise.
//!
//! All state a pass needs is carried explicitly: the `RefreshContext` owns
//! the fetcher and its cache, the `SessionState` carries what the previous
//! pass left behind.

use crate::advisor::advise;
use crate::aggregate::{aggregate, zone_members};
use crate::feed::market::SnapshotFetch;
use crate::feed::zones::ZoneFetch;
use crate::feed::{Fetcher, SourceFailure};
use crate::logging::{
    log, log_fetch_failure, log_phase, log_zone_summary, obj, v_str, Domain, Level, ProfileScope,
};
use crate::model::{AssetRecord, MarketSnapshot, ZoneStats, ZoneTokenRecord};
use crate::phase::{classify_snapshot, BandStats, Phase, PhaseThresholds};
use crate::state::{Config, SessionState, ZoneSource};

pub struct RefreshContext {
    fetcher: Fetcher,
}

impl RefreshContext {
    pub fn new(cfg: Config) -> Self {
        Self::with_fetcher(Fetcher::new(cfg))
    }

    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn config(&self) -> &Config {
        self.fetcher.config()
    }
}

/// Everything the display collaborator needs for one frame.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub phase: Phase,
    pub advice: &'static str,
    pub btc_dominance_pct: Option<f64>,
    pub eth_btc_ratio: Option<f64>,
    pub bands: BandStats,
    pub assets: Vec<AssetRecord>,
    pub zone_source: ZoneSource,
    pub zones: Vec<ZoneStats>,
    pub selected_zone: Option<String>,
    pub selected_members: Vec<ZoneTokenRecord>,
    pub failures: Vec<SourceFailure>,
    pub generated_at: String,
}

impl DashboardView {
    /// False when no market source produced anything; the phase is then
    /// the neutral default.
    pub fn market_data_available(&self) -> bool {
        self.btc_dominance_pct.is_some() || self.eth_btc_ratio.is_some() || !self.assets.is_empty()
    }

    pub fn zone_data_available(&self) -> bool {
        !self.zones.is_empty()
    }
}

/// Pure part of the pass, separated from fetching so it can be tested.
pub fn build_view(
    thresholds: &PhaseThresholds,
    market: SnapshotFetch,
    zones: ZoneFetch,
    session: &mut SessionState,
) -> DashboardView {
    let SnapshotFetch { snapshot, failures } = market;
    let phase = classify_snapshot(thresholds, &snapshot);
    let MarketSnapshot {
        btc_dominance_pct,
        eth_btc_ratio,
        ranked_assets,
    } = snapshot;

    let bands = BandStats::compute(&ranked_assets, thresholds.altcoin_drop_pct);
    log_phase(phase, btc_dominance_pct, eth_btc_ratio, &bands);

    if let Some(previous) = session.record_phase(phase) {
        log(
            Level::Info,
            Domain::Phase,
            "phase_changed",
            obj(&[("from", v_str(previous.label())), ("to", v_str(phase.label()))]),
        );
    }

    let stats = aggregate(&zones.records);
    log_zone_summary(zones.source.as_str(), zones.records.len(), stats.len());

    let selected_members = session
        .selected_zone
        .as_deref()
        .map(|z| zone_members(&zones.records, z).into_iter().cloned().collect())
        .unwrap_or_default();

    let mut all_failures = failures;
    all_failures.extend(zones.failures);

    DashboardView {
        phase,
        advice: advise(phase),
        btc_dominance_pct,
        eth_btc_ratio,
        bands,
        assets: ranked_assets,
        zone_source: zones.source,
        zones: stats,
        selected_zone: session.selected_zone.clone(),
        selected_members,
        failures: all_failures,
        generated_at: crate::logging::ts_now(),
    }
}

/// Run one full pass. Never fails: unavailable sources degrade the view.
pub async fn run_pass(ctx: &RefreshContext, session: &mut SessionState) -> DashboardView {
    let _scope = ProfileScope::new("render_pass");

    let market = ctx.fetcher.snapshot().await;
    let zones = ctx.fetcher.zone_records().await;
    for f in market.failures.iter().chain(zones.failures.iter()) {
        log_fetch_failure(&f.source, &f.failure);
    }

    build_view(&ctx.config().thresholds, market, zones, session)
}
