// WebSocket alert endpoint. Every text frame is one alert; the sender gets one
// JSON ack frame back per alert: `{"incident": "<id>"}` or `{"error": "..."}`.

use std::fmt::Display;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use incman_core::incident::Severity;

/// JSON body of one alert frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertPayload {
    pub source: String,
    pub message: String,
    pub severity: Severity,
}

impl AlertPayload {
    /// Parse and check a frame. Blank `source` or `message` is rejected.
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        let payload: AlertPayload = serde_json::from_str(json)?;
        if payload.source.trim().is_empty() {
            anyhow::bail!("alert source is empty");
        }
        if payload.message.trim().is_empty() {
            anyhow::bail!("alert message is empty");
        }
        Ok(payload)
    }
}

/// Answer returned to the alert sender.
#[derive(Debug, Clone, PartialEq)]
pub enum Ack {
    Opened { incident_id: String },
    Rejected { reason: String },
}

impl Ack {
    pub fn to_frame(&self) -> Message {
        let body = match self {
            Ack::Opened { incident_id } => json!({ "incident": incident_id }),
            Ack::Rejected { reason } => json!({ "error": reason }),
        };
        Message::text(body.to_string())
    }
}

/// Events handed to the intake loop.
#[derive(Debug)]
pub enum ListenerEvent {
    Connected { addr: String },
    Disconnected { addr: String },
    /// A well-formed alert. The intake loop must answer on `reply`.
    Alert {
        payload: AlertPayload,
        reply: oneshot::Sender<Ack>,
    },
}

/// The intake loop is gone; the listener should stop accepting.
#[derive(Debug, PartialEq)]
pub struct IntakeClosed;

/// Bind a TCP listener on `127.0.0.1:{port}`. Port 0 picks a free port.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Alert listener bound on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve alert senders one connection at a time until the intake loop drops
/// its receiver.
pub async fn serve(listener: TcpListener, tx: mpsc::Sender<ListenerEvent>) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let addr = peer.to_string();

        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%addr, "rejected alert connection: {e}");
                continue;
            }
        };

        if tx
            .send(ListenerEvent::Connected { addr: addr.clone() })
            .await
            .is_err()
        {
            break;
        }

        let (mut sink, source) = ws.split();
        if relay_alerts(source, &mut sink, &tx, &addr).await.is_err() {
            break;
        }
        if tx.send(ListenerEvent::Disconnected { addr }).await.is_err() {
            break;
        }
    }

    info!("Alert intake closed, listener stopping");
    Ok(())
}

/// Read alert frames from `source` until the sender closes or the transport
/// fails, writing one ack per frame to `sink`. Malformed frames are answered
/// here and never reach the intake loop.
pub async fn relay_alerts<St, Si>(
    mut source: St,
    sink: &mut Si,
    tx: &mpsc::Sender<ListenerEvent>,
    addr: &str,
) -> Result<(), IntakeClosed>
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(frame) = source.next().await {
        let ack = match frame {
            Ok(Message::Text(text)) => match AlertPayload::parse(text.as_str()) {
                Ok(payload) => submit(tx, payload).await?,
                Err(e) => {
                    warn!(addr, "rejected alert frame: {e:#}");
                    Ack::Rejected {
                        reason: format!("{e:#}"),
                    }
                }
            },
            Ok(Message::Binary(_)) => Ack::Rejected {
                reason: "alerts must be sent as text frames".into(),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(addr, "alert connection failed: {e}");
                break;
            }
        };

        if let Err(e) = sink.send(ack.to_frame()).await {
            warn!(addr, "could not acknowledge alert: {e}");
            break;
        }
    }

    debug!(addr, "alert sender finished");
    Ok(())
}

async fn submit(tx: &mpsc::Sender<ListenerEvent>, payload: AlertPayload) -> Result<Ack, IntakeClosed> {
    let (reply, answer) = oneshot::channel();
    tx.send(ListenerEvent::Alert { payload, reply })
        .await
        .map_err(|_| IntakeClosed)?;
    answer.await.map_err(|_| IntakeClosed)
}
