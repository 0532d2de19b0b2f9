//! Boolean monitor command in, typed host signals out.
//!
//! The host only ever says "monitor" or "stop monitoring"; the bridge turns
//! that into connector calls and turns connector events into [`HostSignal`]s
//! that carry a ready-made navigation reference.

use tokio::sync::{broadcast, mpsc};
use url::form_urlencoded;

use crate::error::Result;
use crate::models::Notification;
use crate::monitor::{MonitorEvent, StreamConnector};

/// Stream path for all mailboxes.
pub const MONITOR_PATH: &str = "/api/v1/monitor/messages";

#[derive(Debug, Clone, PartialEq)]
pub struct RoutedNotification {
    pub notification: Notification,
    /// `/mailbox?name=..&id=..`, see [`nav_ref`].
    pub href: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostSignal {
    ConnectionChanged(bool),
    Notification(RoutedNotification),
}

pub fn nav_ref(mailbox: &str, id: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("name", mailbox)
        .append_pair("id", id)
        .finish();
    format!("/mailbox?{query}")
}

/// Read `(mailbox, id)` back out of a reference built by [`nav_ref`].
pub fn parse_nav_ref(href: &str) -> Option<(String, String)> {
    let query = href.strip_prefix("/mailbox?")?;
    let mut name = None;
    let mut id = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "name" => name = Some(value.into_owned()),
            "id" => id = Some(value.into_owned()),
            _ => {}
        }
    }
    Some((name?, id?))
}

pub struct CommandBridge {
    connector: StreamConnector,
    path: String,
    events: broadcast::Receiver<MonitorEvent>,
}

impl CommandBridge {
    pub fn new(connector: StreamConnector, path: impl Into<String>) -> Self {
        let events = connector.subscribe();
        CommandBridge {
            connector,
            path: path.into(),
            events,
        }
    }

    /// Apply one monitor command. Starting while already connected (or
    /// connecting) does nothing.
    pub async fn command(&mut self, start: bool) -> Result<()> {
        if start {
            if self.connector.is_active() {
                log::debug!("Monitor start ignored: already active");
                return Ok(());
            }
            self.connector.open(Some(&self.path)).await
        } else {
            self.connector.close().await;
            Ok(())
        }
    }

    pub fn translate(event: MonitorEvent) -> HostSignal {
        match event {
            MonitorEvent::Connected(up) => HostSignal::ConnectionChanged(up),
            MonitorEvent::Message(notification) => {
                let href = nav_ref(&notification.mailbox, &notification.id);
                HostSignal::Notification(RoutedNotification { notification, href })
            }
        }
    }

    /// Next signal from the connector. `None` once the connector is gone.
    pub async fn next_signal(&mut self) -> Option<HostSignal> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(Self::translate(event)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Monitor bridge fell behind, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Serve the host until either channel closes, then close the connection.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<bool>,
        signals: mpsc::UnboundedSender<HostSignal>,
    ) {
        enum Step {
            Command(Option<bool>),
            Signal(Option<HostSignal>),
        }

        loop {
            let step = tokio::select! {
                cmd = commands.recv() => Step::Command(cmd),
                sig = self.next_signal() => Step::Signal(sig),
            };
            match step {
                Step::Command(Some(start)) => {
                    if let Err(e) = self.command(start).await {
                        log::error!("Monitor command failed: {}", e);
                        if signals.send(HostSignal::ConnectionChanged(false)).is_err() {
                            break;
                        }
                    }
                }
                Step::Signal(Some(signal)) => {
                    if signals.send(signal).is_err() {
                        break;
                    }
                }
                Step::Command(None) | Step::Signal(None) => break,
            }
        }

        log::debug!("Monitor bridge stopping");
        self.connector.dispose().await;
    }
}
