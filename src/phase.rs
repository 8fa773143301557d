//! Money-flow phase classification from a market snapshot.
//!
//! Capital is assumed to rotate BTC → ETH → large caps → altcoins and then
//! back out. Each hop is detected with a single threshold; the first rule
//! that fires wins and everything else falls through to `Reset`.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::model::{AssetRecord, MarketSnapshot};

/// Upper bound (exclusive) of the Bitcoin-tier band.
pub const LARGECAP_START: usize = 10;
/// Upper bound (exclusive) of the large-cap band; altcoins start here.
pub const ALTCOIN_START: usize = 30;

/// One of the five money-flow phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Bitcoin,
    Ethereum,
    LargeCaps,
    Altseason,
    Reset,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Bitcoin,
        Phase::Ethereum,
        Phase::LargeCaps,
        Phase::Altseason,
        Phase::Reset,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Bitcoin => "Phase 1 - Bitcoin",
            Phase::Ethereum => "Phase 2 - Ethereum",
            Phase::LargeCaps => "Phase 3 - Large Caps",
            Phase::Altseason => "Phase 4 - Altseason",
            Phase::Reset => "Phase 5 - Reset",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .find(|p| p.label() == s.trim())
            .copied()
            .ok_or_else(|| format!("unknown phase label: {}", s))
    }
}

/// Rule thresholds. `Default` reproduces the canonical cascade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseThresholds {
    /// BTC dominance (%) above which the market is in Phase 1.
    pub btc_dominance_pct: f64,
    /// ETH/BTC price ratio above which the market is in Phase 2.
    pub eth_btc_ratio: f64,
    /// Mean 24h change (%) of ranks [10,30) for Phase 3.
    pub largecap_change_pct: f64,
    /// Mean 24h change (%) of ranks [30,..) for Phase 4.
    pub altcoin_change_pct: f64,
    /// A 24h change (%) below this counts as an altcoin drop.
    pub altcoin_drop_pct: f64,
    /// Share of dropping altcoins above which Phase 5 fires explicitly.
    pub altcoin_drop_rate: f64,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            btc_dominance_pct: 52.0,
            eth_btc_ratio: 0.06,
            largecap_change_pct: 5.0,
            altcoin_change_pct: 10.0,
            altcoin_drop_pct: -5.0,
            altcoin_drop_rate: 0.4,
        }
    }
}

/// Momentum figures for the large-cap and altcoin bands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BandStats {
    pub avg_largecap_change: Option<f64>,
    pub avg_altcoin_change: Option<f64>,
    pub altcoin_drop_rate: Option<f64>,
}

impl BandStats {
    pub fn compute(ranked: &[AssetRecord], drop_pct: f64) -> Self {
        let largecap = band(ranked, LARGECAP_START, ALTCOIN_START);
        let altcoins = band(ranked, ALTCOIN_START, ranked.len());

        // An empty altcoin band has no rate at all.
        let altcoin_drop_rate = if altcoins.is_empty() {
            None
        } else {
            let drops = altcoins
                .iter()
                .filter(|a| a.price_change_pct_24h.map_or(false, |c| c < drop_pct))
                .count();
            Some(drops as f64 / altcoins.len() as f64)
        };

        Self {
            avg_largecap_change: mean_change(largecap),
            avg_altcoin_change: mean_change(altcoins),
            altcoin_drop_rate,
        }
    }
}

/// Inclusive-exclusive slice that tolerates short lists.
fn band(ranked: &[AssetRecord], start: usize, end: usize) -> &[AssetRecord] {
    let end = end.min(ranked.len());
    if start >= end {
        &[]
    } else {
        &ranked[start..end]
    }
}

/// Mean of the present 24h changes; absent values are skipped.
fn mean_change(assets: &[AssetRecord]) -> Option<f64> {
    let (sum, n) = assets
        .iter()
        .filter_map(|a| a.price_change_pct_24h)
        .filter(|c| c.is_finite())
        .fold((0.0, 0usize), |(s, n), c| (s + c, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

fn exceeds(value: Option<f64>, threshold: f64) -> bool {
    value.map_or(false, |v| v > threshold)
}

/// Classify with the default thresholds.
pub fn classify(
    btc_dominance_pct: Option<f64>,
    eth_btc_ratio: Option<f64>,
    ranked_assets: &[AssetRecord],
) -> Phase {
    classify_with(
        &PhaseThresholds::default(),
        btc_dominance_pct,
        eth_btc_ratio,
        ranked_assets,
    )
}

/// Ordered cascade; the first rule that fires wins.
pub fn classify_with(
    th: &PhaseThresholds,
    btc_dominance_pct: Option<f64>,
    eth_btc_ratio: Option<f64>,
    ranked_assets: &[AssetRecord],
) -> Phase {
    if exceeds(btc_dominance_pct, th.btc_dominance_pct) {
        return Phase::Bitcoin;
    }
    if exceeds(eth_btc_ratio, th.eth_btc_ratio) {
        return Phase::Ethereum;
    }
    if !ranked_assets.is_empty() {
        let bands = BandStats::compute(ranked_assets, th.altcoin_drop_pct);
        if exceeds(bands.avg_largecap_change, th.largecap_change_pct) {
            return Phase::LargeCaps;
        }
        if exceeds(bands.avg_altcoin_change, th.altcoin_change_pct) {
            return Phase::Altseason;
        }
        if exceeds(bands.altcoin_drop_rate, th.altcoin_drop_rate) {
            return Phase::Reset;
        }
    }
    Phase::Reset
}

/// Convenience wrapper over a whole snapshot.
pub fn classify_snapshot(th: &PhaseThresholds, snapshot: &MarketSnapshot) -> Phase {
    classify_with(
        th,
        snapshot.btc_dominance_pct,
        snapshot.eth_btc_ratio,
        &snapshot.ranked_assets,
    )
}
