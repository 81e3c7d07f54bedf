//! tunebot-server/src/server.rs
//!
//! Runs the dispatcher until Ctrl-C, then leaves voice and closes the gateway.

use std::sync::Arc;

use tracing::{error, info, warn};

use tunebot_core::platforms::PlatformIntegration;
use tunebot_core::{BotConfig, Error};

use crate::context::ServerContext;

pub async fn run_server(config: BotConfig) -> Result<(), Error> {
    let (mut ctx, events) = ServerContext::new(&config).await?;

    let dispatcher = Arc::clone(&ctx.dispatcher);
    let dispatcher_handle = tokio::spawn(dispatcher.run(events, ctx.event_bus.shutdown_rx.clone()));

    // Ctrl-C => signal
    let eb_for_ctrlc = ctx.event_bus.clone();
    let _ctrlc_handle = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e:?}");
        }
        info!("Ctrl-C detected; shutting down event bus...");
        eb_for_ctrlc.shutdown();
    });

    let mut shutdown_rx = ctx.event_bus.shutdown_rx.clone();
    while !*shutdown_rx.borrow() {
        if shutdown_rx.changed().await.is_err() {
            break;
        }
    }
    info!("Shutdown signaled; tearing down.");

    if let Err(e) = dispatcher_handle.await {
        warn!("Dispatcher task ended abnormally: {e}");
    }

    let stopped = ctx.playback.stop_all().await;
    let left = ctx.voice.release_all().await;
    info!("Stopped {stopped} track(s) and left {left} voice channel(s).");

    if let Err(e) = ctx.platform.disconnect().await {
        error!("Failed to disconnect from Discord: {e}");
    }
    info!("Server shutdown complete.");
    Ok(())
}
