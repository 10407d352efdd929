// src/main.rs
use pose_coach::collaborators::{NoPoseModel, SilentSpeech, TemplateFeedback};
use pose_coach::{Coach, CoachConfig, InboundMessage, OutboundMessage};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the responses, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pose_coach=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = CoachConfig::resolve(config_path.as_deref())?;
    tracing::info!(
        window_secs = config.window_secs,
        min_sample_interval_secs = config.min_sample_interval_secs,
        "pose coach ready, reading JSON lines from stdin"
    );

    let coach = Coach::new(NoPoseModel, TemplateFeedback::default(), SilentSpeech, config);

    let (tx, mut rx) = mpsc::channel::<InboundMessage>(64);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    for message in InboundMessage::decode(&line) {
                        if tx.send(message).await.is_err() {
                            return;
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!("stdin closed with error: {err}");
                    break;
                }
            }
        }
    });

    // sessions run back to back until the input ends
    let mut stdout = tokio::io::stdout();
    while let Some(response) = coach.run_session(&mut rx).await {
        let line = OutboundMessage::from(&response).encode()?;
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    reader.abort();
    Ok(())
}
