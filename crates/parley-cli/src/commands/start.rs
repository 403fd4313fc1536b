use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use parley_channels::{Channel, TelegramChannel};
use parley_config::ParleyConfig;
use parley_core::ParleyError;

pub(super) async fn cmd_start(
    config: ParleyConfig,
    no_server: bool,
    no_telegram: bool,
) -> parley_core::Result<()> {
    println!("💬 Parley v{}", env!("CARGO_PKG_VERSION"));
    println!("   Model: {}", config.agent.model);
    println!("   Tool rounds per turn: {}", config.agent.max_tool_rounds);
    if !config.services.has_search() {
        println!("   performWebSearch: not configured");
    }
    if !config.services.has_cloudinary() {
        println!("   Cloudinary tools: not configured");
    }
    println!();

    let engine = super::build_engine(&config)?;
    let mut tasks = JoinSet::new();

    if no_server {
        info!("HTTP server disabled by --no-server");
    } else {
        let server_config = config.server.clone();
        let engine = Arc::clone(&engine);
        println!("   Web chat: http://{}", server_config.listen);
        tasks.spawn(async move {
            if let Err(e) = parley_server::start_server(server_config, engine).await {
                error!(error = %e, "HTTP server exited with error");
            }
            "server"
        });
    }

    match (no_telegram, config.telegram_token()) {
        (true, _) => info!("Telegram bot disabled by --no-telegram"),
        (false, None) => warn!("Telegram bot not started: no token configured"),
        (false, Some(token)) => {
            let mut channel = TelegramChannel::new("telegram".into(), token.to_string());
            let events = channel.start().await?;
            let channel: Arc<dyn Channel> = Arc::new(channel);
            let engine = Arc::clone(&engine);
            println!("   Telegram bot: polling");
            tasks.spawn(async move {
                parley_runtime::run_channel(engine, channel, events).await;
                "telegram"
            });
        }
    }

    if tasks.is_empty() {
        return Err(ParleyError::Config(
            "nothing to run: both the HTTP server and the Telegram bot are disabled".into(),
        ));
    }
    println!();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!();
            info!("shutdown requested");
        }
        Some(done) = tasks.join_next() => {
            match done {
                Ok(name) => warn!(task = name, "task stopped, shutting down"),
                Err(e) => error!(error = %e, "task panicked"),
            }
        }
    }

    tasks.abort_all();
    println!("👋 Goodbye!");
    Ok(())
}
