use chrono::{TimeZone, Utc};
use std::fs;
use tempfile::TempDir;

use moneyflow::export::{export_categories, file_sha256, EXPORT_COLUMNS};
use moneyflow::model::CategorySummary;

fn category(id: &str, name: &str, change: Option<f64>) -> CategorySummary {
    CategorySummary {
        id: id.to_string(),
        name: name.to_string(),
        num_tokens: Some(10),
        avg_price_change: change,
        market_cap: Some(1.5e9),
        market_cap_change: Some(-0.5),
        volume: Some(2.0e8),
        volume_change: None,
        last_updated: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
    }
}

#[test]
fn export_writes_timestamped_csv() {
    let dir = TempDir::new().unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap();
    let cats = vec![
        category("a1", "DeFi", Some(1.25)),
        category("b2", "Gaming, Metaverse", None),
    ];

    let report = export_categories(dir.path(), &cats, at).unwrap();

    assert_eq!(
        report.path.file_name().and_then(|s| s.to_str()),
        Some("zone_data_cmc_20240501_1430.csv")
    );
    assert_eq!(report.rows, 2);

    let body = fs::read_to_string(&report.path).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], EXPORT_COLUMNS.join(","));
    assert!(lines[1].starts_with("a1,DeFi,10,1.25,1500000000,-0.5,200000000,,2024-05-01T10:00:00"));
    assert!(lines[2].starts_with("b2,\"Gaming, Metaverse\",10,,"));
}

#[test]
fn export_hash_matches_file() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("exports");
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap();

    let report = export_categories(&nested, &[category("x", "AI", Some(3.0))], at).unwrap();

    assert_eq!(report.sha256.len(), 64);
    assert_eq!(file_sha256(&report.path).unwrap(), report.sha256);
}

#[test]
fn empty_listing_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let report = export_categories(dir.path(), &[], Utc::now()).unwrap();
    let body = fs::read_to_string(&report.path).unwrap();
    assert_eq!(body.lines().count(), 1);
    assert_eq!(report.rows, 0);
}
