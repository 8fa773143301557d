use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;

use moneyflow::export::export_categories;
use moneyflow::feed::Fetcher;
use moneyflow::logging::{log, obj, v_num, v_str, Domain, Level};
use moneyflow::state::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.export_dir));
    let limit = cfg.zone_limit;
    let fetcher = Fetcher::new(cfg);

    let categories = fetcher
        .categories(limit)
        .await
        .context("fetching category listing")?;
    let report = export_categories(&dir, &categories, Utc::now())
        .with_context(|| format!("writing export into {}", dir.display()))?;

    log(
        Level::Info,
        Domain::Zone,
        "zone_export",
        obj(&[
            ("path", v_str(&report.path.display().to_string())),
            ("rows", v_num(report.rows as f64)),
            ("sha256", v_str(&report.sha256)),
        ]),
    );
    println!("{}", report.path.display());
    Ok(())
}
