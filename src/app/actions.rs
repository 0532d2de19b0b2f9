use bucketwatch_core::client::MailStore;
use cosmic::app::Task;

use super::{AppModel, Message};

impl AppModel {
    pub(super) fn handle_actions(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::DeleteSelected => {
                let (Some(client), Some(mailbox), Some(id)) = (
                    self.client.clone(),
                    self.cache.mailbox().map(str::to_string),
                    self.selected.clone(),
                ) else {
                    return Task::none();
                };
                self.status_message = "Deleting message...".into();
                return cosmic::task::future(async move {
                    let result = client.delete(&mailbox, &id).await;
                    Message::DeleteComplete { id, result }
                });
            }

            Message::DeleteComplete { id, result } => match self.cache.settle_removal(result) {
                Ok(ticket) => {
                    if self.selected.as_deref() == Some(id.as_str()) {
                        self.clear_selection();
                    }
                    self.status_message = "Message deleted".into();
                    if let Some(ticket) = ticket {
                        return self.fetch_list(ticket);
                    }
                }
                Err(e) => {
                    log::error!("Failed to delete message {}: {}", id, e);
                    self.status_message = format!("Delete failed: {e}");
                }
            },

            Message::Purge => {
                let (Some(client), Some(mailbox)) =
                    (self.client.clone(), self.cache.mailbox().map(str::to_string))
                else {
                    return Task::none();
                };
                self.status_message = format!("Purging {mailbox}...");
                return cosmic::task::future(async move {
                    Message::PurgeComplete(
                        client.purge_mailbox(&mailbox).await.map_err(|e| e.to_string()),
                    )
                });
            }
            Message::PurgeComplete(Ok(())) => {
                self.clear_selection();
                self.status_message = "Mailbox purged".into();
                return self.dispatch(Message::Refresh);
            }
            Message::PurgeComplete(Err(e)) => {
                log::error!("Purge failed: {}", e);
                self.status_message = format!("Purge failed: {e}");
            }

            _ => {}
        }
        Task::none()
    }
}
