use std::sync::Arc;

use bucketwatch_core::bridge::{parse_nav_ref, CommandBridge, HostSignal};
use bucketwatch_core::models::NotificationKind;
use bucketwatch_core::monitor::{StreamConnector, WsTransport};
use cosmic::app::Task;
use futures::SinkExt;
use tokio::sync::mpsc;
use url::Url;

use super::{AppModel, Message, MonitorState};

#[derive(Debug, Clone)]
pub enum MonitorUpdate {
    /// The bridge is running and takes start/stop commands on this sender.
    Ready(mpsc::UnboundedSender<bool>),
    Signal(HostSignal),
    Ended,
}

/// Run a command bridge for the lifetime of the subscription. Dropping the
/// stream drops the bridge, which closes any open connection.
pub(super) fn monitor_stream(
    origin: Url,
    path: String,
) -> impl futures::Stream<Item = MonitorUpdate> {
    cosmic::iced_futures::stream::channel(50, move |mut output| async move {
        let connector = StreamConnector::new(Arc::new(WsTransport), origin);
        let bridge = CommandBridge::new(connector, path);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (sig_tx, mut sig_rx) = mpsc::unbounded_channel();

        if output.send(MonitorUpdate::Ready(cmd_tx)).await.is_err() {
            return;
        }

        let pump = async {
            while let Some(signal) = sig_rx.recv().await {
                if output.send(MonitorUpdate::Signal(signal)).await.is_err() {
                    break;
                }
            }
        };
        tokio::join!(bridge.run(cmd_rx, sig_tx), pump);

        log::info!("Monitor bridge ended");
        let _ = output.send(MonitorUpdate::Ended).await;
    })
}

impl AppModel {
    pub(super) fn handle_watch(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Monitor(MonitorUpdate::Ready(commands)) => {
                self.monitor_commands = Some(commands);
                if self.monitor_wanted {
                    self.send_monitor_command(true);
                }
            }
            Message::Monitor(MonitorUpdate::Ended) => {
                self.monitor_commands = None;
                self.monitor_state = MonitorState::Off;
            }

            Message::Monitor(MonitorUpdate::Signal(HostSignal::ConnectionChanged(true))) => {
                self.monitor_state = MonitorState::Connected;
                self.status_message = "Monitoring for new mail".into();
            }
            Message::Monitor(MonitorUpdate::Signal(HostSignal::ConnectionChanged(false))) => {
                if self.monitor_wanted {
                    self.monitor_state = MonitorState::Disconnected;
                    self.status_message = "Monitor disconnected".into();
                    log::warn!("Monitor disconnected while enabled");
                } else {
                    self.monitor_state = MonitorState::Off;
                }
            }

            Message::Monitor(MonitorUpdate::Signal(HostSignal::Notification(routed))) => {
                let n = &routed.notification;
                log::debug!("Notification {:?} for {}/{}", n.kind, n.mailbox, n.id);

                let mut tasks = Vec::new();
                if n.kind == NotificationKind::Stored && self.config.desktop_notifications {
                    let summary = format!("{}: {}", n.mailbox, n.display_subject());
                    let from = n.from.clone();
                    tasks.push(cosmic::task::future(async move {
                        let _ = tokio::task::spawn_blocking(move || {
                            let _ = notify_rust::Notification::new()
                                .summary(&summary)
                                .body(&format!("From: {}", from))
                                .icon("mail-message-new")
                                .timeout(5000)
                                .show();
                        })
                        .await;
                        Message::Noop
                    }));
                }

                let viewing = self.cache.mailbox() == Some(n.mailbox.as_str());
                if n.kind == NotificationKind::Stored {
                    self.push_notification(routed);
                }
                if viewing {
                    tasks.push(self.dispatch(Message::Refresh));
                }
                return cosmic::task::batch(tasks);
            }

            Message::ToggleMonitor(on) => {
                self.monitor_wanted = on;
                self.send_monitor_command(on);
            }
            Message::RetryMonitor => {
                self.monitor_wanted = true;
                self.send_monitor_command(true);
            }

            Message::NotificationClicked(href) => {
                let Some((mailbox, id)) = parse_nav_ref(&href) else {
                    log::warn!("Unroutable notification link {}", href);
                    return Task::none();
                };
                if self.cache.mailbox() == Some(mailbox.as_str()) && self.cache.contains(&id) {
                    return self.dispatch(Message::SelectMessage(id));
                }
                self.mailbox_input = mailbox.clone();
                return self.open_mailbox(mailbox, Some(id));
            }
            Message::ClearNotifications => {
                self.notifications.clear();
            }

            _ => {}
        }
        Task::none()
    }

    fn send_monitor_command(&mut self, start: bool) {
        if start && self.monitor_state == MonitorState::Connected {
            return;
        }
        let Some(commands) = &self.monitor_commands else {
            // Applied once the bridge reports ready.
            log::debug!("Monitor bridge not ready, deferring command {}", start);
            return;
        };
        if commands.send(start).is_err() {
            log::error!("Monitor bridge is gone");
            self.monitor_commands = None;
            self.monitor_state = MonitorState::Off;
            self.status_message = "Monitor unavailable".into();
            return;
        }
        self.monitor_state = if start {
            MonitorState::Connecting
        } else {
            MonitorState::Off
        };
    }
}
