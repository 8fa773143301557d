//! Plain-text rendering of a `DashboardView`.
//!
//! Presentation only; nothing in the core depends on this module.

use std::fmt::Write as _;
use std::io;

use crate::pipeline::DashboardView;

const UNAVAILABLE: &str = "data unavailable";

/// Consumer of rendered frames.
pub trait ViewSink {
    fn show(&mut self, view: &DashboardView) -> io::Result<()>;
}

/// Writes text frames to any `io::Write`.
pub struct TextSink<W: io::Write> {
    out: W,
    /// Rows of the asset table to print; 0 hides it.
    asset_rows: usize,
}

impl<W: io::Write> TextSink<W> {
    pub fn new(out: W, asset_rows: usize) -> Self {
        Self { out, asset_rows }
    }
}

impl<W: io::Write> ViewSink for TextSink<W> {
    fn show(&mut self, view: &DashboardView) -> io::Result<()> {
        let frame = render(view, self.asset_rows);
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }
}

/// `1234567.891` with 2 decimals → `1,234,567.89`.
pub fn fmt_grouped(value: f64, decimals: usize) -> String {
    let raw = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };
    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && raw.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Signed percentage, e.g. `+1.23%`.
pub fn fmt_signed_pct(value: f64) -> String {
    format!("{:+.2}%", value)
}

fn opt_or<T>(v: Option<T>, f: impl Fn(T) -> String) -> String {
    v.map(f).unwrap_or_else(|| "-".to_string())
}

pub fn render(view: &DashboardView, asset_rows: usize) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "== Crypto Money Flow Phase Tracker ({}) ==", view.generated_at);

    let dominance = view
        .btc_dominance_pct
        .map(|d| format!("{:.2}%", d))
        .unwrap_or_else(|| UNAVAILABLE.to_string());
    let ratio = view
        .eth_btc_ratio
        .map(|r| format!("{:.4}", r))
        .unwrap_or_else(|| UNAVAILABLE.to_string());
    let _ = writeln!(s, "BTC Dominance: {:<20} ETH/BTC Ratio: {}", dominance, ratio);
    let _ = writeln!(s);
    let _ = writeln!(s, "Current Phase: {}", view.phase);
    let _ = writeln!(s, "  -> {}", view.advice);
    if !view.market_data_available() {
        let _ = writeln!(s, "  (market {}; showing the neutral phase)", UNAVAILABLE);
    }

    let _ = writeln!(s);
    let _ = writeln!(s, "Zones (source: {})", view.zone_source.as_str());
    if view.zone_data_available() {
        let _ = writeln!(s, "{:<32} {:>12} {:>14} {:>7}", "Zone", "Avg 24H", "Avg Vol Chg", "Tokens");
        for z in &view.zones {
            let _ = writeln!(
                s,
                "{:<32} {:>12} {:>14} {:>7}",
                truncate(&z.zone, 32),
                fmt_signed_pct(z.avg_price_change_pct),
                opt_or(z.avg_volume_change_pct, fmt_signed_pct),
                z.token_count
            );
        }
    } else {
        let _ = writeln!(s, "  zone {}", UNAVAILABLE);
    }

    if let Some(zone) = &view.selected_zone {
        let _ = writeln!(s);
        let _ = writeln!(s, "Zone detail: {} ({} tokens)", zone, view.selected_members.len());
        for r in &view.selected_members {
            let _ = writeln!(
                s,
                "  {:<14} {:>16} {:>10} {:>20}",
                r.symbol.as_deref().unwrap_or(&r.token_id),
                opt_or(r.price, |p| fmt_grouped(p, 4)),
                opt_or(r.price_change_pct_24h, fmt_signed_pct),
                opt_or(r.volume_24h, |v| fmt_grouped(v, 0)),
            );
        }
    }

    if asset_rows > 0 && !view.assets.is_empty() {
        let _ = writeln!(s);
        let _ = writeln!(
            s,
            "{:<4} {:<24} {:<8} {:>16} {:>10} {:>20}",
            "#", "Name", "Symbol", "Current Price", "24H", "Total Volume"
        );
        for (rank, a) in view.assets.iter().take(asset_rows).enumerate() {
            let _ = writeln!(
                s,
                "{:<4} {:<24} {:<8} {:>16} {:>10} {:>20}",
                rank + 1,
                truncate(&a.name, 24),
                a.symbol,
                opt_or(a.current_price, |p| fmt_grouped(p, 2)),
                opt_or(a.price_change_pct_24h, fmt_signed_pct),
                opt_or(a.total_volume, |v| fmt_grouped(v, 0)),
            );
        }
    }

    if !view.failures.is_empty() {
        let _ = writeln!(s);
        for f in &view.failures {
            let _ = writeln!(s, "! {}: {}", f.source, f.failure);
        }
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}
