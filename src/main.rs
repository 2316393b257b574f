#![allow(dead_code, unused_imports)]

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use cable_club_trader::{
    config::Config,
    link::tcp::run_link_server,
    protocol::{engine::TradeEngine, session::TrainerIdentity},
    server,
    server::admin::AdminState,
    storage::SlotTable,
    types::TradeEvent,
};
use parking_lot::Mutex;
use tokio::{net::TcpListener, signal, sync::broadcast};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".into());
    let config = Config::from_file(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    let mut table = SlotTable::new(config.storage.capacity);
    if config.storage.seed_demo {
        table.seed_demo();
    }
    if let Some(slot) = config.storage.outgoing_slot {
        table.set_outgoing(slot);
    }
    let slots = Arc::new(Mutex::new(table));

    let engine = Arc::new(Mutex::new(TradeEngine::new(
        Box::new(Arc::clone(&slots)),
        TrainerIdentity {
            id: config.trainer.id,
            name: config.trainer.name.clone(),
        },
    )));

    let (events_tx, _) = broadcast::channel::<TradeEvent>(256);

    let link_addr: SocketAddr = format!("{}:{}", config.link.host, config.link.port)
        .parse()
        .context("invalid link host/port")?;
    let link_listener = TcpListener::bind(link_addr).await?;
    tracing::info!("link cable listening on {link_addr}");

    {
        let engine = Arc::clone(&engine);
        let events_tx = events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = run_link_server(link_listener, engine, events_tx).await {
                tracing::error!("link server error: {e}");
            }
        });
    }

    let admin_state = AdminState {
        token: config.server.admin_token.clone(),
        engine,
        slots,
    };
    let telemetry_router = server::build_telemetry_router(events_tx);
    let admin_router = server::build_admin_router(admin_state);

    let ws_addr: SocketAddr = format!("{}:{}", config.server.ws_host, config.server.ws_port)
        .parse()
        .context("invalid ws_host/ws_port")?;
    let admin_addr: SocketAddr = format!("{}:{}", config.server.ws_host, config.server.admin_port)
        .parse()
        .context("invalid admin_port")?;

    let ws_listener = TcpListener::bind(ws_addr).await?;
    let admin_listener = TcpListener::bind(admin_addr).await?;

    tracing::info!("telemetry ws listening on {ws_addr}");
    tracing::info!("admin http listening on {admin_addr}");

    tokio::select! {
        res = axum::serve(ws_listener, telemetry_router) => {
            res.context("telemetry server error")?;
        }
        res = axum::serve(admin_listener, admin_router) => {
            res.context("admin server error")?;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
