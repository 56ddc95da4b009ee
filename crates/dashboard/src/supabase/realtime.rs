//! Realtime change-notification sub-client.
//!
//! Speaks the backend's phoenix-style websocket protocol: join a channel
//! with a `postgres_changes` config, answer with heartbeats, and forward
//! change events to subscribers. The connection is owned by a background
//! task with reconnect-and-backoff; the returned
//! [`RealtimeSubscription`] is the cancellable handle the owner must keep
//! and close on teardown.
//!
//! Subscribers only learn *that* a row changed - the consistent practice is
//! to re-fetch the full list, never to merge deltas.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::SupabaseError;

/// Keepalive ping interval required by the backend.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// First reconnect delay after a dropped connection.
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Reconnect delay ceiling.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(120);
/// Buffered change events per subscription.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A row-change notification.
#[derive(Debug, Clone)]
pub struct PostgresChange {
    /// `INSERT`, `UPDATE`, or `DELETE`.
    pub kind: String,
    /// Table the change happened on.
    pub table: String,
}

/// One `postgres_changes` listen entry in the channel join config.
#[derive(Debug, Clone, Serialize)]
struct ChangeFilter {
    event: String,
    schema: String,
    table: String,
}

/// Client for the `realtime/v1` surface.
#[derive(Clone)]
pub struct RealtimeClient {
    ws_url: Url,
    anon_key: String,
}

impl RealtimeClient {
    /// Create the realtime sub-client.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::BadUrl`] when the base URL has no usable
    /// websocket form.
    pub fn new(base: &Url, anon_key: String) -> Result<Self, SupabaseError> {
        let mut ws_url = super::join_url(base, "realtime/v1/websocket")?;
        let scheme = if base.scheme() == "http" { "ws" } else { "wss" };
        ws_url
            .set_scheme(scheme)
            .map_err(|()| SupabaseError::Realtime("URL scheme not replaceable".to_owned()))?;
        ws_url
            .query_pairs_mut()
            .append_pair("apikey", &anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(Self { ws_url, anon_key })
    }

    /// Start building a channel subscription.
    #[must_use]
    pub fn channel(&self, name: &str) -> ChannelBuilder {
        ChannelBuilder {
            client: self.clone(),
            topic: format!("realtime:{name}"),
            filters: Vec::new(),
        }
    }
}

/// Builder for a channel subscription.
#[must_use]
pub struct ChannelBuilder {
    client: RealtimeClient,
    topic: String,
    filters: Vec<ChangeFilter>,
}

impl ChannelBuilder {
    /// Listen for row changes on a table.
    ///
    /// `event` is `"INSERT"`, `"UPDATE"`, `"DELETE"`, or `"*"`.
    pub fn on_postgres_changes(mut self, event: &str, schema: &str, table: &str) -> Self {
        self.filters.push(ChangeFilter {
            event: event.to_owned(),
            schema: schema.to_owned(),
            table: table.to_owned(),
        });
        self
    }

    /// Open the subscription.
    ///
    /// Spawns the connection-owning task and returns its handle. Connection
    /// failures are retried with backoff until the handle is closed; they
    /// never propagate to the caller.
    pub fn subscribe(self) -> RealtimeSubscription {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let worker = ChannelWorker {
            client: self.client,
            topic: self.topic.clone(),
            filters: self.filters,
            events: events.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());
        RealtimeSubscription {
            topic: self.topic,
            cancel,
            task: Some(task),
            events,
        }
    }
}

/// Handle to an open channel subscription.
///
/// Owned by exactly one component; dropping it tears the connection down,
/// but owners should prefer the explicit [`unsubscribe`](Self::unsubscribe)
/// so teardown is awaited.
pub struct RealtimeSubscription {
    topic: String,
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
    events: broadcast::Sender<PostgresChange>,
}

impl RealtimeSubscription {
    /// Channel topic this subscription is joined to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscribe to the change events this channel receives.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<PostgresChange> {
        self.events.subscribe()
    }

    /// Close the subscription and wait for the connection task to finish.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The connection-owning task.
struct ChannelWorker {
    client: RealtimeClient,
    topic: String,
    filters: Vec<ChangeFilter>,
    events: broadcast::Sender<PostgresChange>,
    cancel: CancellationToken,
}

impl ChannelWorker {
    async fn run(self) {
        let mut delay = INITIAL_RECONNECT_DELAY;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            let started = tokio::time::Instant::now();
            match self.connect_and_listen().await {
                Ok(()) => return, // cancelled from inside the session
                Err(err) => {
                    // A session that held for a while earns a fresh backoff.
                    if started.elapsed() > MAX_RECONNECT_DELAY {
                        delay = INITIAL_RECONNECT_DELAY;
                    }
                    tracing::warn!(
                        topic = %self.topic,
                        error = %err,
                        retry_in_secs = delay.as_secs(),
                        "realtime connection lost"
                    );
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
    }

    /// One connection session: join, heartbeat, forward events.
    async fn connect_and_listen(&self) -> Result<(), SupabaseError> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.client.ws_url.as_str())
            .await
            .map_err(|e| SupabaseError::Realtime(e.to_string()))?;
        let (mut sink, mut source) = stream.split();
        tracing::debug!(topic = %self.topic, "realtime connected");

        let mut msg_ref: u64 = 0;
        let join = json!({
            "topic": self.topic,
            "event": "phx_join",
            "payload": {
                "config": { "postgres_changes": self.filters },
                "access_token": self.client.anon_key,
            },
            "ref": next_ref(&mut msg_ref),
        });
        send_json(&mut sink, &join).await?;

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        heartbeat.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let leave = json!({
                        "topic": self.topic,
                        "event": "phx_leave",
                        "payload": {},
                        "ref": next_ref(&mut msg_ref),
                    });
                    // Best effort - the socket is going away either way.
                    let _ = send_json(&mut sink, &leave).await;
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    let beat = json!({
                        "topic": "phoenix",
                        "event": "heartbeat",
                        "payload": {},
                        "ref": next_ref(&mut msg_ref),
                    });
                    send_json(&mut sink, &beat).await?;
                }
                incoming = source.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(SupabaseError::Realtime("connection closed".to_owned()));
                        }
                        Some(Err(e)) => return Err(SupabaseError::Realtime(e.to_string())),
                    }
                }
            }
        }
    }

    /// Parse one incoming frame, forwarding `postgres_changes` events.
    fn handle_text(&self, text: &str) {
        let Ok(frame) = serde_json::from_str::<serde_json::Value>(text) else {
            tracing::debug!(topic = %self.topic, "unparseable realtime frame");
            return;
        };
        if frame.get("event").and_then(|e| e.as_str()) != Some("postgres_changes") {
            return;
        }
        let data = frame.pointer("/payload/data");
        let change = PostgresChange {
            kind: data
                .and_then(|d| d.get("type"))
                .and_then(|t| t.as_str())
                .unwrap_or("UNKNOWN")
                .to_owned(),
            table: data
                .and_then(|d| d.get("table"))
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_owned(),
        };
        tracing::debug!(topic = %self.topic, kind = %change.kind, table = %change.table, "row change");
        let _ = self.events.send(change);
    }
}

fn next_ref(counter: &mut u64) -> String {
    *counter += 1;
    counter.to_string()
}

async fn send_json<S>(sink: &mut S, value: &serde_json::Value) -> Result<(), SupabaseError>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = value.to_string();
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| SupabaseError::Realtime(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_from_https_base() {
        let client = RealtimeClient::new(
            &"https://proj.supabase.co".parse().unwrap(),
            "anon".into(),
        )
        .unwrap();
        let url = client.ws_url.as_str();
        assert!(url.starts_with("wss://proj.supabase.co/realtime/v1/websocket?"));
        assert!(url.contains("apikey=anon"));
        assert!(url.contains("vsn=1.0.0"));
    }

    #[test]
    fn test_ws_url_from_plain_http_base() {
        let client =
            RealtimeClient::new(&"http://127.0.0.1:54321".parse().unwrap(), "anon".into())
                .unwrap();
        assert!(client.ws_url.as_str().starts_with("ws://127.0.0.1:54321/"));
    }

    #[test]
    fn test_channel_topic_prefix() {
        let client = RealtimeClient::new(
            &"https://proj.supabase.co".parse().unwrap(),
            "anon".into(),
        )
        .unwrap();
        let builder = client
            .channel("profiles-changes")
            .on_postgres_changes("*", "public", "profiles");
        assert_eq!(builder.topic, "realtime:profiles-changes");
        assert_eq!(builder.filters.len(), 1);
    }
}
