//! Push-notification stream connector.
//!
//! A [`StreamConnector`] owns at most one live connection to the server's
//! monitor endpoint and republishes its lifecycle as [`MonitorEvent`]s:
//! `Connected(true)` when the link opens, `Connected(false)` when it ends for
//! any reason, and `Message` for every frame that decodes.
//!
//! Each connection is driven by its own task. `close` waits for that task, so
//! the `Connected(false)` of an old link is always published before the
//! `Connected(true)` of its replacement.

#[cfg(test)]
pub(crate) mod mock;
mod transport;

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{Error, Result};
use crate::models::{Notification, NotificationKind};

pub use transport::{Frame, Link, Transport, WsTransport};

/// Subscriber queue depth. A subscriber that falls further behind than this
/// sees `RecvError::Lagged`.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl LinkState {
    pub fn is_live(self) -> bool {
        matches!(self, LinkState::Connecting | LinkState::Open)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Connected(bool),
    Message(Notification),
}

/// Build the stream address for `path` on the server at `origin`, choosing
/// `wss` for `https` origins and `ws` for `http`. A path prefix on the origin
/// is kept, matching the REST endpoints.
pub fn monitor_url(origin: &Url, path: &str) -> Result<Url> {
    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(Error::Address(format!(
                "unsupported scheme {other:?} in {origin}"
            )))
        }
    };
    if origin.host_str().is_none() {
        return Err(Error::Address(format!("{origin} has no host")));
    }
    let mut url = origin.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.set_scheme(scheme)
        .map_err(|_| Error::Address(format!("cannot use {scheme} for {origin}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::Address(format!("{origin} cannot be a base URL")))?
        .pop_if_empty()
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}

#[derive(Deserialize)]
struct EventEnvelope {
    variant: String,
    #[serde(default)]
    identifier: Option<EventIdentifier>,
    #[serde(default)]
    header: Option<Notification>,
}

#[derive(Deserialize)]
struct EventIdentifier {
    mailbox: String,
    id: String,
}

/// Decode one frame. Accepts a bare message header or a
/// `{variant, identifier, header}` event envelope.
pub fn decode_frame(bytes: &[u8]) -> Result<Notification> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if value.get("variant").is_none() {
        return Ok(serde_json::from_value(value)?);
    }

    let envelope: EventEnvelope = serde_json::from_value(value)?;
    let kind = match envelope.variant.as_str() {
        "message-stored" => NotificationKind::Stored,
        "message-deleted" => NotificationKind::Deleted,
        other => return Err(Error::Decode(format!("unknown event variant {other:?}"))),
    };
    match (envelope.header, envelope.identifier) {
        (Some(mut header), _) => {
            header.kind = kind;
            Ok(header)
        }
        (None, Some(ident)) => Ok(Notification {
            kind,
            mailbox: ident.mailbox,
            id: ident.id,
            from: String::new(),
            to: Vec::new(),
            subject: String::new(),
            date: None,
            size: 0,
        }),
        (None, None) => Err(Error::Decode("event without identifier".into())),
    }
}

struct ActiveLink {
    target: Url,
    // Dropping this sender (including when the connector itself is dropped)
    // tells the link task to close the connection.
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct StreamConnector {
    transport: Arc<dyn Transport>,
    origin: Url,
    events: broadcast::Sender<MonitorEvent>,
    state: Arc<watch::Sender<LinkState>>,
    active: Option<ActiveLink>,
}

impl StreamConnector {
    pub fn new(transport: Arc<dyn Transport>, origin: Url) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (state, _) = watch::channel(LinkState::Idle);
        StreamConnector {
            transport,
            origin,
            events,
            state: Arc::new(state),
            active: None,
        }
    }

    /// Receive every event published from now on, in publication order.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some() && self.state().is_live()
    }

    pub fn target(&self) -> Option<&Url> {
        self.active.as_ref().map(|a| &a.target)
    }

    /// Connect to `path` on the origin. `None` does nothing; a live link to the
    /// same address is kept; anything else replaces the current link.
    pub async fn open(&mut self, path: Option<&str>) -> Result<()> {
        let Some(path) = path else {
            return Ok(());
        };
        let target = monitor_url(&self.origin, path)?;

        if self.is_active() && self.target() == Some(&target) {
            log::debug!("Monitor already connected to {}", target);
            return Ok(());
        }

        self.close().await;

        log::info!("Connecting monitor to {}", target);
        self.state.send_replace(LinkState::Connecting);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(drive_link(
            self.transport.clone(),
            target.clone(),
            self.events.clone(),
            self.state.clone(),
            shutdown_rx,
        ));
        self.active = Some(ActiveLink {
            target,
            shutdown,
            task,
        });
        Ok(())
    }

    /// Close the current link, if any, and wait until it has fully ended.
    pub async fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        log::info!("Closing monitor connection to {}", active.target);
        let _ = active.shutdown.send(());
        if let Err(e) = active.task.await {
            log::warn!("Monitor task for {} ended abnormally: {}", active.target, e);
        }
    }

    pub async fn dispose(mut self) {
        self.close().await;
    }
}

async fn drive_link(
    transport: Arc<dyn Transport>,
    target: Url,
    events: broadcast::Sender<MonitorEvent>,
    state: Arc<watch::Sender<LinkState>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        result = transport.connect(target.clone()) => result,
        _ = &mut shutdown => {
            log::debug!("Monitor connect to {} abandoned", target);
            finish(&events, &state);
            return;
        }
    };
    let mut link = match connected {
        Ok(link) => link,
        Err(e) => {
            log::warn!("Monitor connect to {} failed: {}", target, e);
            finish(&events, &state);
            return;
        }
    };

    state.send_replace(LinkState::Open);
    let _ = events.send(MonitorEvent::Connected(true));
    log::info!("Monitor connected to {}", target);

    let closed_by_owner = loop {
        let frame = tokio::select! {
            _ = &mut shutdown => break true,
            frame = link.next_frame() => frame,
        };
        match frame {
            Some(Ok(frame)) => match decode_frame(frame.as_bytes()) {
                Ok(notification) => {
                    let _ = events.send(MonitorEvent::Message(notification));
                }
                Err(e) => log::warn!("Dropping undecodable monitor frame: {}", e),
            },
            Some(Err(e)) => {
                log::warn!("Monitor connection to {} failed: {}", target, e);
                break false;
            }
            None => {
                log::info!("Monitor connection to {} closed by server", target);
                break false;
            }
        }
    };

    if closed_by_owner {
        link.close().await;
    }
    drop(link);
    finish(&events, &state);
}

fn finish(events: &broadcast::Sender<MonitorEvent>, state: &watch::Sender<LinkState>) {
    state.send_replace(LinkState::Closed);
    let _ = events.send(MonitorEvent::Connected(false));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::mock::{Call, MockTransport};
    use super::*;

    const PATH: &str = "/api/v1/monitor/messages";

    fn connector(transport: &MockTransport) -> StreamConnector {
        StreamConnector::new(
            Arc::new(transport.clone()),
            Url::parse("http://localhost:9000").unwrap(),
        )
    }

    async fn next_event(rx: &mut broadcast::Receiver<MonitorEvent>) -> MonitorEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for monitor event")
            .expect("event channel closed")
    }

    const HEADER: &str = r#"{"mailbox":"swaks","id":"0001","from":"a@x.com","subject":"Hello","size":12}"#;

    #[test]
    fn url_scheme_follows_origin() {
        let plain = Url::parse("http://localhost:9000").unwrap();
        assert_eq!(
            monitor_url(&plain, PATH).unwrap().as_str(),
            "ws://localhost:9000/api/v1/monitor/messages"
        );

        let secure = Url::parse("https://mail.example.com").unwrap();
        assert_eq!(
            monitor_url(&secure, "api/v1/monitor/messages/box").unwrap().as_str(),
            "wss://mail.example.com/api/v1/monitor/messages/box"
        );

        let prefixed = Url::parse("http://host:8080/inbucket/").unwrap();
        assert_eq!(
            monitor_url(&prefixed, PATH).unwrap().as_str(),
            "ws://host:8080/inbucket/api/v1/monitor/messages"
        );

        let prefixed = Url::parse("https://mail.example.com/ui?tab=1").unwrap();
        assert_eq!(
            monitor_url(&prefixed, PATH).unwrap().as_str(),
            "wss://mail.example.com/ui/api/v1/monitor/messages"
        );

        let ftp = Url::parse("ftp://example.com").unwrap();
        assert!(matches!(monitor_url(&ftp, PATH), Err(Error::Address(_))));
    }

    #[test]
    fn decode_plain_header() {
        let n = decode_frame(HEADER.as_bytes()).unwrap();
        assert_eq!(n.kind, NotificationKind::Stored);
        assert_eq!(n.mailbox, "swaks");
        assert_eq!(n.id, "0001");
        assert_eq!(n.subject, "Hello");
    }

    #[test]
    fn decode_event_envelopes() {
        let stored = format!(r#"{{"variant":"message-stored","header":{HEADER}}}"#);
        let n = decode_frame(stored.as_bytes()).unwrap();
        assert_eq!(n.kind, NotificationKind::Stored);
        assert_eq!(n.subject, "Hello");

        let deleted =
            r#"{"variant":"message-deleted","identifier":{"mailbox":"swaks","id":"0001"}}"#;
        let n = decode_frame(deleted.as_bytes()).unwrap();
        assert_eq!(n.kind, NotificationKind::Deleted);
        assert_eq!(n.id, "0001");

        assert!(decode_frame(br#"{"variant":"renamed","identifier":null}"#).is_err());
        assert!(decode_frame(br#"{"variant":"message-stored"}"#).is_err());
    }

    #[test]
    fn decode_accepts_null_recipients() {
        let frame = r#"{"mailbox":"swaks","id":"0001","from":"a@x.com","to":null,"subject":"Hello"}"#;
        let n = decode_frame(frame.as_bytes()).unwrap();
        assert_eq!(n.id, "0001");
        assert!(n.to.is_empty());

        let stored = format!(r#"{{"variant":"message-stored","header":{frame}}}"#);
        let n = decode_frame(stored.as_bytes()).unwrap();
        assert_eq!(n.kind, NotificationKind::Stored);
        assert!(n.to.is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode_frame(b"not json"), Err(Error::Decode(_))));
        assert!(matches!(decode_frame(br#"{"mailbox":"x"}"#), Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn open_without_path_does_nothing() {
        let transport = MockTransport::default();
        let mut conn = connector(&transport);
        conn.open(None).await.unwrap();
        assert_eq!(conn.state(), LinkState::Idle);
        assert!(!conn.is_active());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn identical_target_is_idempotent() {
        let transport = MockTransport::default();
        let mut conn = connector(&transport);
        let mut rx = conn.subscribe();

        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));
        conn.open(Some(PATH)).await.unwrap();
        conn.open(Some(PATH)).await.unwrap();

        assert_eq!(transport.opens(), 1);
        assert_eq!(conn.state(), LinkState::Open);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_target_closes_old_link_first() {
        let transport = MockTransport::default();
        let mut conn = connector(&transport);
        let mut rx = conn.subscribe();

        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));

        conn.open(Some("/api/v1/monitor/messages/swaks")).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(false));
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));

        assert_eq!(
            transport.calls(),
            vec![
                Call::Open("ws://localhost:9000/api/v1/monitor/messages".into()),
                Call::Close("ws://localhost:9000/api/v1/monitor/messages".into()),
                Call::Open("ws://localhost:9000/api/v1/monitor/messages/swaks".into()),
            ]
        );
        assert_eq!(
            conn.target().map(Url::as_str),
            Some("ws://localhost:9000/api/v1/monitor/messages/swaks")
        );
    }

    #[tokio::test]
    async fn frames_are_decoded_and_garbage_dropped() {
        let transport = MockTransport::default();
        let mut conn = connector(&transport);
        let mut rx = conn.subscribe();

        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));

        transport.push(Frame::Text("{{ definitely not json".into()));
        transport.push(Frame::Binary(HEADER.as_bytes().to_vec()));

        match next_event(&mut rx).await {
            MonitorEvent::Message(n) => assert_eq!(n.id, "0001"),
            other => panic!("expected message, got {other:?}"),
        }
        // The bad frame did not take the link down.
        assert_eq!(conn.state(), LinkState::Open);
    }

    #[tokio::test]
    async fn remote_close_reports_disconnect_and_allows_reopen() {
        let transport = MockTransport::default();
        let mut conn = connector(&transport);
        let mut rx = conn.subscribe();

        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));

        transport.hang_up();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(false));
        assert_eq!(conn.state(), LinkState::Closed);
        assert!(!conn.is_active());

        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test]
    async fn refused_connection_reports_disconnect() {
        let transport = MockTransport::default();
        transport.refuse_connections(true);
        let mut conn = connector(&transport);
        let mut rx = conn.subscribe();

        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(false));
        assert_eq!(conn.state(), LinkState::Closed);
        assert_eq!(transport.opens(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let transport = MockTransport::default();
        let mut conn = connector(&transport);
        let mut rx = conn.subscribe();

        conn.close().await;
        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));

        conn.close().await;
        conn.close().await;
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(false));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            transport.calls().last(),
            Some(&Call::Close("ws://localhost:9000/api/v1/monitor/messages".into()))
        );
    }

    #[tokio::test]
    async fn dropping_connector_releases_link() {
        let transport = MockTransport::default();
        let mut conn = connector(&transport);
        let mut rx = conn.subscribe();

        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));

        drop(conn);
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(false));
        assert!(matches!(transport.calls().last(), Some(Call::Close(_))));
    }

    #[tokio::test]
    async fn dispose_closes_link() {
        let transport = MockTransport::default();
        let mut conn = connector(&transport);
        let mut rx = conn.subscribe();

        conn.open(Some(PATH)).await.unwrap();
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(true));
        conn.dispose().await;

        assert_eq!(transport.calls().len(), 2);
        assert_eq!(next_event(&mut rx).await, MonitorEvent::Connected(false));
    }
}
