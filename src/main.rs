use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use zkrisk::config::Config;
use zkrisk::feed::{PriceFeedSource, PythHermesSource};
use zkrisk::inference::{InferenceBackend, OnnxBackend};
use zkrisk::logging::{log, log_lifecycle, obj, v_num, v_str, Domain, Level};
use zkrisk::service::RiskService;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    log_lifecycle("startup", "volatility risk service starting");

    let feed: Arc<dyn PriceFeedSource> = Arc::new(PythHermesSource::new(
        &cfg.hermes_endpoint,
        Duration::from_secs(cfg.request_timeout_secs),
    ));

    // A missing or unloadable model is not fatal: the predictor degrades to
    // the statistical path and flags it in metadata.
    let backend: Option<Arc<dyn InferenceBackend>> =
        match OnnxBackend::load(Path::new(&cfg.model_path)) {
            Ok(b) => {
                log(
                    Level::Info,
                    Domain::Model,
                    "model_loaded",
                    obj(&[("path", v_str(&cfg.model_path))]),
                );
                Some(Arc::new(b))
            }
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Model,
                    "model_unavailable",
                    obj(&[
                        ("path", v_str(&cfg.model_path)),
                        ("error", v_str(&err.to_string())),
                        ("msg", v_str("running in degraded estimation mode")),
                    ]),
                );
                None
            }
        };

    let service = RiskService::new(cfg.clone(), feed, backend);
    service.start()?;

    // Periodic status report until SIGINT.
    let mut status_tick = interval(Duration::from_secs(300));
    status_tick.tick().await; // first tick is immediate
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status_tick.tick() => {
                for symbol in &cfg.symbols {
                    let summary = service.get_summary(symbol);
                    log(
                        Level::Info,
                        Domain::System,
                        "status",
                        obj(&[
                            ("symbol", v_str(symbol)),
                            ("model_volatility", v_num(summary.model_volatility)),
                            ("historical_volatility", v_num(summary.historical_volatility)),
                            ("lambda", v_num(summary.lambda)),
                            ("risk_tier", v_str(summary.risk_tier.as_str())),
                            ("data_points", v_num(summary.data_points as f64)),
                        ]),
                    );
                }
            }
        }
    }

    log_lifecycle("shutdown", "stop requested, draining collector");
    service.stop().await;

    for overview in service.history_overview() {
        log(
            Level::Info,
            Domain::System,
            "final_overview",
            obj(&[
                ("symbol", v_str(&overview.symbol)),
                ("count", v_num(overview.count as f64)),
                (
                    "latest_price",
                    overview.latest_price.map(v_num).unwrap_or(serde_json::Value::Null),
                ),
            ]),
        );
    }
    log_lifecycle("shutdown", "service stopped");
    Ok(())
}
