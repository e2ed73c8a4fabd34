//! Realtime change feed over the Phoenix websocket protocol.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{remote_id_of, RemoteChange, RemoteError, RemoteResult, RemoteTable, Subscription};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

fn topic(table: RemoteTable) -> String {
    format!("realtime:public:{}", table.as_str())
}

fn join_message(table: RemoteTable) -> Value {
    json!({
        "topic": topic(table),
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table.as_str() }
                ]
            }
        },
        "ref": "1",
    })
}

fn heartbeat_message(message_ref: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": message_ref.to_string(),
    })
}

/// Extract a row change from a realtime frame.
///
/// Returns `None` for replies, heartbeats and anything that is not a
/// `postgres_changes` event.
pub fn parse_change(text: &str) -> Option<RemoteChange> {
    let frame: Value = serde_json::from_str(text).ok()?;
    if frame.get("event")?.as_str()? != "postgres_changes" {
        return None;
    }

    let data = frame.get("payload")?.get("data")?;
    match data.get("type")?.as_str()? {
        "INSERT" => Some(RemoteChange::Insert(data.get("record")?.clone())),
        "UPDATE" => Some(RemoteChange::Update(data.get("record")?.clone())),
        "DELETE" => Some(RemoteChange::Delete {
            id: remote_id_of(data.get("old_record")?)?,
        }),
        _ => None,
    }
}

/// Join the change channel of `table` and feed its events into a
/// [`Subscription`].
pub(super) async fn subscribe(url: &str, table: RemoteTable) -> RemoteResult<Subscription> {
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|error| RemoteError::Realtime(error.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(join_message(table).to_string()))
        .await
        .map_err(|error| RemoteError::Realtime(error.to_string()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut message_ref = 1_u64;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    message_ref += 1;
                    let frame = heartbeat_message(message_ref).to_string();
                    if write.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(change) = parse_change(&text) {
                                if tx.send(change).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if write.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(error)) => {
                            tracing::warn!("Realtime channel for {table} failed: {error}");
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }

        tracing::debug!("Realtime channel for {table} closed");
    });

    tracing::info!("Subscribed to realtime changes on {table}");
    Ok(Subscription::new(table, rx).with_task(task))
}
