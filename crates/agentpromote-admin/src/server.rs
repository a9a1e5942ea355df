//! Operator socket server
//!
//! Accepts TCP connections and speaks the newline-delimited JSON protocol
//! from [`crate::protocol`]. Promotions run in their own tasks so the
//! connection stays responsive; the single-in-flight policy lives in the
//! core, not here.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use agentpromote_core::promote::Promoter;

use crate::protocol::{Command, Event};

/// Listen on `addr` and serve operator connections until shutdown
pub async fn run(addr: &str, promoter: Arc<Promoter>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr, "admin interface listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        tracing::info!(%peer, "operator connected");
        tokio::spawn(handle_connection(socket, promoter.clone()));
    }
}

async fn handle_connection(socket: TcpStream, promoter: Arc<Promoter>) {
    let (reader, mut writer) = socket.into_split();
    let (tx, mut rx) = mpsc::channel::<Event>(32);

    // Writer task: events from any command task, one JSON line each
    let write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let mut line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize event");
                    continue;
                }
            };
            line.push('\n');
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        dispatch(Command::parse(&line), &promoter, &tx).await;
    }

    drop(tx);
    let _ = write_task.await;
    tracing::info!("operator disconnected");
}

async fn dispatch(command: Command, promoter: &Arc<Promoter>, tx: &mpsc::Sender<Event>) {
    match command {
        Command::DeployDevToTest => {
            spawn_promotion(promoter.clone(), tx.clone(), PromotionKind::DevToTest).await;
        }
        Command::DeployTestToProduction => {
            spawn_promotion(promoter.clone(), tx.clone(), PromotionKind::TestToProd).await;
        }
        Command::Rollback => {
            spawn_promotion(promoter.clone(), tx.clone(), PromotionKind::Rollback).await;
        }
        Command::RunDiff => {
            let envs = promoter.environments().clone();
            let event = match promoter.compute_diff(&envs.dev, &envs.test).await {
                Ok(changes) => Event::AcceptanceOutput {
                    items: changes.summaries(),
                },
                Err(e) => Event::from_promotion_error(&e),
            };
            let _ = tx.send(event).await;
        }
        Command::Unsupported(name) => {
            let _ = tx
                .send(Event::SystemError {
                    kind: "unsupported".to_string(),
                    message: format!("command {name} is not available on this interface"),
                })
                .await;
        }
        Command::Invalid(reason) => {
            let _ = tx
                .send(Event::SystemError {
                    kind: "protocol".to_string(),
                    message: reason,
                })
                .await;
        }
    }
}

#[derive(Clone, Copy)]
enum PromotionKind {
    DevToTest,
    TestToProd,
    Rollback,
}

async fn spawn_promotion(
    promoter: Arc<Promoter>,
    tx: mpsc::Sender<Event>,
    kind: PromotionKind,
) {
    let envs = promoter.environments().clone();
    let (from, to) = match kind {
        PromotionKind::DevToTest => (envs.dev.name.clone(), envs.test.name.clone()),
        PromotionKind::TestToProd => (envs.test.name.clone(), envs.prod.name.clone()),
        PromotionKind::Rollback => (envs.prod.name.clone(), envs.prod.name.clone()),
    };
    let _ = tx
        .send(Event::PromotionStarted {
            from: from.clone(),
            to: to.clone(),
        })
        .await;

    tokio::spawn(async move {
        let result = match kind {
            PromotionKind::DevToTest => promoter.deploy_dev_to_test().await,
            PromotionKind::TestToProd => promoter.deploy_test_to_production().await,
            PromotionKind::Rollback => promoter.rollback().await,
        };
        let event = match result {
            Ok(report) => Event::PromotionFinished {
                from: report.from,
                to: report.to,
                run_id: report.run_id.to_string(),
                changed_files: report.changed_files,
            },
            Err(e) => Event::from_promotion_error(&e),
        };
        let _ = tx.send(event).await;
    });
}
