//! News gatekeeper: binary entrypoint.
//!
//! `news-gatekeeper`                 serve the HTTP API (GATEKEEPER_ADDR, default 0.0.0.0:8080)
//! `news-gatekeeper rank <file>`     rank a JSON array of documents once and print the result

use std::path::PathBuf;

use anyhow::{bail, Context};
use news_gatekeeper::{app, CancelFlag, GatekeeperConfig, Pipeline, RawDocument};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_FILTER: &str = "scoring=info,artifacts=info,diversity=info,judge=info,pipeline=info,api=info,warn";

/// RUST_LOG wins over the default filter; LOG_FORMAT=json switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; keys and GATEKEEPER_CONFIG_PATH may live there.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = GatekeeperConfig::load_default()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("rank") => {
            let Some(path) = args.get(1) else {
                bail!("usage: news-gatekeeper rank <documents.json>");
            };
            rank_file(&cfg, PathBuf::from(path)).await
        }
        Some(other) => bail!("unknown command `{other}`"),
        None => serve(&cfg).await,
    }
}

async fn rank_file(cfg: &GatekeeperConfig, path: PathBuf) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading documents from {}", path.display()))?;
    let raw: Vec<RawDocument> = serde_json::from_str(&content)
        .with_context(|| format!("parsing documents from {}", path.display()))?;

    let cancel = CancelFlag::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let out = Pipeline::from_config(cfg).execute(raw, &cancel).await;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn serve(cfg: &GatekeeperConfig) -> anyhow::Result<()> {
    let router = app(cfg)?;
    let addr = std::env::var("GATEKEEPER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(target: "api", %addr, judge = cfg.judge.enabled, "gatekeeper listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
