use bucketwatch_core::preview;
use cosmic::app::Task;

use super::{AppModel, Message};

impl AppModel {
    pub(super) fn handle_body(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SelectMessage(id) => {
                let (Some(client), Some(mailbox)) = (self.client.clone(), self.cache.mailbox())
                else {
                    return Task::none();
                };
                let mailbox = mailbox.to_string();
                let unseen = self.cache.get(&id).is_some_and(|m| !m.seen);

                self.selected = Some(id.clone());
                self.detail = None;
                self.status_message = "Loading message...".into();

                let mut tasks = Vec::new();
                {
                    let client = client.clone();
                    let mailbox = mailbox.clone();
                    let id = id.clone();
                    tasks.push(cosmic::task::future(async move {
                        let result = client
                            .get_message(&mailbox, &id)
                            .await
                            .map_err(|e| e.to_string());
                        Message::DetailLoaded { id, result }
                    }));
                }
                if unseen {
                    tasks.push(cosmic::task::future(async move {
                        let result = client
                            .mark_seen(&mailbox, &id)
                            .await
                            .map_err(|e| e.to_string());
                        Message::MarkSeenComplete { id, result }
                    }));
                }
                return cosmic::task::batch(tasks);
            }

            Message::DetailLoaded { id, result: Ok(detail) } => {
                // Ignore late answers for a message no longer selected.
                if self.selected.as_deref() == Some(id.as_str()) {
                    self.detail = Some(detail);
                    self.status_message = "Ready".into();
                }
            }
            Message::DetailLoaded { id, result: Err(e) } => {
                log::error!("Failed to load message {}: {}", id, e);
                if self.selected.as_deref() == Some(id.as_str()) {
                    self.status_message = format!("Failed to load message: {e}");
                }
            }

            Message::MarkSeenComplete { id, result: Ok(()) } => {
                self.cache.set_seen(&id);
            }
            Message::MarkSeenComplete { id, result: Err(e) } => {
                log::warn!("Failed to mark {} seen: {}", id, e);
            }

            Message::ViewSource => {
                let (Some(client), Some(mailbox), Some(id)) =
                    (&self.client, self.cache.mailbox(), self.selected.as_deref())
                else {
                    return Task::none();
                };
                match client.source_url(mailbox, id) {
                    Ok(url) => open_link(url.as_str()),
                    Err(e) => {
                        log::error!("No source link for {}: {}", id, e);
                        self.status_message = format!("Cannot open source: {e}");
                    }
                }
            }

            Message::ViewHtml => {
                let Some(detail) = &self.detail else {
                    return Task::none();
                };
                match preview::write_html(detail, &preview::preview_dir()) {
                    Ok(path) => open_link(&path.to_string_lossy()),
                    Err(e) => {
                        log::error!("No HTML preview for {}: {}", detail.summary.id, e);
                        self.status_message = format!("Cannot open HTML: {e}");
                    }
                }
            }

            Message::OpenAttachment(index) => {
                if let Some(att) = self.detail.as_ref().and_then(|d| d.attachments.get(index)) {
                    let link = if att.view_link.is_empty() {
                        &att.download_link
                    } else {
                        &att.view_link
                    };
                    if link.is_empty() {
                        self.status_message = format!("{} has no link", att.filename);
                    } else {
                        open_link(link);
                    }
                }
            }

            _ => {}
        }
        Task::none()
    }
}

/// Open a URL or file in the system browser.
fn open_link(url: &str) {
    if let Err(e) = open::that(url) {
        log::warn!("Failed to open {}: {}", url, e);
    }
}
