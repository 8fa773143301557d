use anyhow::Result;
use tokio::time::{sleep, Duration};

use moneyflow::display::{TextSink, ViewSink};
use moneyflow::logging::{log, obj, v_num, v_str, Domain, Level};
use moneyflow::pipeline::{run_pass, RefreshContext};
use moneyflow::state::{Config, SessionState};

const ASSET_ROWS: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("zone_source", v_str(cfg.zone_source.as_str())),
            ("refresh_secs", v_num(cfg.refresh_secs as f64)),
            ("cmc_key", v_str(if cfg.cmc_api_key.is_some() { "set" } else { "missing" })),
        ]),
    );

    let refresh = cfg.refresh_secs;
    let mut session = SessionState::new(cfg.selected_zone.clone());
    let ctx = RefreshContext::new(cfg);
    let mut sink = TextSink::new(std::io::stdout(), ASSET_ROWS);

    loop {
        let view = run_pass(&ctx, &mut session).await;
        sink.show(&view)?;

        if refresh == 0 {
            break;
        }
        let stats = ctx.fetcher().cache_stats();
        log(
            Level::Debug,
            Domain::Cache,
            "cache_stats",
            obj(&[
                ("hits", v_num(stats.hits as f64)),
                ("misses", v_num(stats.misses as f64)),
                ("pass", v_num(session.passes as f64)),
            ]),
        );
        sleep(Duration::from_secs(refresh)).await;
    }
    Ok(())
}
