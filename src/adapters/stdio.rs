//! Line-delimited JSON transport: one request envelope per input line, one
//! response per output line, with expiry broadcasts interleaved.

use crate::core::coordinator::Coordinator;
use crate::domain::messages::{parse_request, Response};
use crate::domain::ports::Storage;
use crate::utils::error::{BlockerError, ErrorCategory, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;

pub async fn serve<S, R, W>(coordinator: Coordinator<S>, reader: R, mut writer: W) -> Result<()>
where
    S: Storage,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut events = coordinator.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("Input closed, stopping transport");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = handle_line(&coordinator, &line).await;
                write_line(&mut writer, &reply).await?;
            }
            event = events.recv() => match event {
                Ok(event) => write_line(&mut writer, &event).await?,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Transport fell behind, {} events dropped", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Answers one raw line. Never fails: every problem becomes an error
/// response, and a request `id` is echoed back when present.
pub async fn handle_line<S: Storage>(coordinator: &Coordinator<S>, line: &str) -> Value {
    let mut raw: Value = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => return to_value(&Response::error(format!("invalid JSON: {}", e))),
    };

    let id = raw.as_object_mut().and_then(|envelope| envelope.remove("id"));

    let response = match parse_request(raw) {
        Ok(request) => coordinator.dispatch(request).await,
        Err(e) => {
            log_rejection(&e);
            Response::error(e.to_string())
        }
    };

    let mut reply = to_value(&response);
    if let (Some(id), Some(object)) = (id, reply.as_object_mut()) {
        object.insert("id".to_string(), id);
    }
    reply
}

/// Malformed traffic from a page context is expected noise; anything else
/// reaching the transport points at the host.
fn log_rejection(error: &BlockerError) {
    match error.category() {
        ErrorCategory::Protocol | ErrorCategory::Validation => {
            tracing::warn!("Rejected message: {}", error)
        }
        ErrorCategory::Persistence | ErrorCategory::Configuration => {
            tracing::error!("Failed to handle message: {}", error)
        }
    }
}

fn to_value(response: &Response) -> Value {
    serde_json::to_value(response)
        .unwrap_or_else(|e| serde_json::json!({ "error": format!("encoding failed: {}", e) }))
}

async fn write_line<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
