//! Pretend to be the telephony provider and place one call against a running bridge.
//!
//! ```text
//! cargo run --example call_simulator -- --url ws://localhost:8080/media
//! ```
//!
//! Received audio is appended to a raw μ-law file for inspection
//! (`ffplay -f mulaw -ar 8000 -ac 1 server_response_audio.mulaw`).

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

#[derive(Debug, Parser)]
struct Args {
    /// Bridge WebSocket URL
    #[arg(long, default_value = "ws://localhost:8080")]
    url: String,

    /// Hang up after this many seconds
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,

    /// Where received audio is written
    #[arg(long, default_value = "server_response_audio.mulaw")]
    output: String,

    /// Delay between the greeting arriving and the simulated reply
    #[arg(long, default_value_t = 2000)]
    reply_delay_ms: u64,
}

/// One second of μ-law silence at 8kHz
const SILENCE: [u8; 8000] = [0xFF; 8000];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!("Connecting to {}", args.url);
    let (socket, _) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}; is the bridge running?", args.url))?;
    let (mut write, mut read) = socket.split();
    info!("Connected, simulating incoming call");

    let call_id = format!("sim-{}", uuid::Uuid::new_v4());
    let start = serde_json::json!({
        "event": "start",
        "start": { "call_sid": call_id, "stream_sid": "sim-stream" }
    });
    write.send(Message::Text(start.to_string())).await?;

    let mut output = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.output)
        .await
        .with_context(|| format!("Failed to open {}", args.output))?;

    let hangup = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(hangup);

    let reply = tokio::time::sleep(Duration::from_secs(86_400));
    tokio::pin!(reply);
    let mut reply_pending = true;

    let mut chunks = 0usize;
    let mut bytes = 0usize;

    loop {
        tokio::select! {
            message = read.next() => {
                match message {
                    Some(Ok(Message::Binary(data))) => {
                        chunks += 1;
                        bytes += data.len();
                        info!("Audio chunk {} received: {} bytes", chunks, data.len());
                        output.write_all(&data).await?;

                        if chunks == 1 && reply_pending {
                            info!("Greeting audio arriving, caller will answer shortly");
                            reply.as_mut().reset(
                                tokio::time::Instant::now() + Duration::from_millis(args.reply_delay_ms),
                            );
                        }
                    }
                    Some(Ok(Message::Text(text))) => info!("Control frame: {}", text),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Connection closed by bridge");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Connection error: {}", e);
                        break;
                    }
                }
            }
            _ = &mut reply, if reply_pending => {
                reply_pending = false;
                write.send(Message::Binary(SILENCE.to_vec())).await?;
                info!("Sent simulated caller audio ({} bytes)", SILENCE.len());
            }
            _ = &mut hangup => {
                info!("Test timeout, hanging up");
                let stop = serde_json::json!({ "event": "stop" });
                write.send(Message::Text(stop.to_string())).await?;
                write.send(Message::Close(None)).await?;
                break;
            }
        }
    }

    output.flush().await?;
    info!("{}", "=".repeat(60));
    info!("Total audio chunks received: {} ({} bytes)", chunks, bytes);
    info!("Audio saved to {}", args.output);
    info!("{}", "=".repeat(60));
    Ok(())
}
