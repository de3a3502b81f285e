use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use tokenscope_lib::config::AppConfig;
use tokenscope_lib::engine::{CollectionView, ShutdownSignal};
use tokenscope_lib::host::{Host, HostMessage, HostReply};
use tokenscope_lib::session::Session;
use tokenscope_lib::sources::MemorySnapshotSource;

fn emit(reply: &HostReply) {
    match serde_json::to_string(reply) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!("Failed to encode reply: {}", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tokenscope_lib::init_tracing(tokenscope_lib::DEFAULT_LOG_FILTER);
    tracing::info!("Starting TokenScope...");

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from(Path::new(&path)),
        None => AppConfig::load(),
    };

    let source = Arc::new(MemorySnapshotSource::new());
    let session = Arc::new(Session::new(&config, source.clone(), config.mirror_store()).await);
    session
        .start()
        .await
        .context("failed to start session agents")?;

    // Push the masked listing after every change
    let printer = {
        let session = session.clone();
        let mut changes = session.collector().subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let collection = CollectionView::from(&session.collector().snapshot().await);
                emit(&HostReply::Collection { collection });
            }
        })
    };

    let host = Host::new(session.clone(), source);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<HostMessage>(line) {
            Ok(message) => {
                if let Some(reply) = host.handle(message).await {
                    emit(&reply);
                }
            }
            Err(e) => emit(&HostReply::Error {
                message: format!("Invalid message: {}", e),
            }),
        }
    }

    tracing::info!("Input closed, shutting down");
    printer.abort();
    session
        .shutdown(ShutdownSignal::last_window())
        .await
        .context("shutdown cleanup failed")?;
    session.stop().await.context("failed to stop agents")?;
    Ok(())
}
