//! Group zone token records into per-zone summary rows.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{ZoneStats, ZoneTokenRecord};

/// Per-zone mean price change, mean volume change and member count.
///
/// Records without a 24h price change are dropped first; a zone left with no
/// members is not emitted. Output is sorted by descending mean price change,
/// ties broken by zone name.
pub fn aggregate(records: &[ZoneTokenRecord]) -> Vec<ZoneStats> {
    // Zone name -> index into `groups`, so member order stays deterministic.
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&ZoneTokenRecord>)> = Vec::new();

    for rec in records {
        match rec.price_change_pct_24h {
            Some(c) if c.is_finite() => {}
            _ => continue,
        }
        let slot = *index.entry(rec.zone.as_str()).or_insert_with(|| {
            groups.push((rec.zone.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(rec);
    }

    let mut stats: Vec<ZoneStats> = groups
        .into_iter()
        .map(|(zone, members)| summarize(zone, &members))
        .collect();

    stats.sort_by(|a, b| {
        b.avg_price_change_pct
            .partial_cmp(&a.avg_price_change_pct)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.zone.cmp(&b.zone))
    });
    stats
}

fn summarize(zone: &str, members: &[&ZoneTokenRecord]) -> ZoneStats {
    let n = members.len();
    let price_sum: f64 = members
        .iter()
        .filter_map(|r| r.price_change_pct_24h)
        .sum();

    let volumes: Vec<f64> = members
        .iter()
        .filter_map(|r| r.volume_change_pct_24h)
        .filter(|v| v.is_finite())
        .collect();
    let avg_volume_change_pct = if volumes.is_empty() {
        None
    } else {
        Some(volumes.iter().sum::<f64>() / volumes.len() as f64)
    };

    ZoneStats {
        zone: zone.to_string(),
        avg_price_change_pct: price_sum / n as f64,
        avg_volume_change_pct,
        token_count: n,
    }
}

/// Members of one zone, in input order.
pub fn zone_members<'a>(records: &'a [ZoneTokenRecord], zone: &str) -> Vec<&'a ZoneTokenRecord> {
    records.iter().filter(|r| r.zone == zone).collect()
}
