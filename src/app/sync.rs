use bucketwatch_core::cache::{RefreshOutcome, RefreshTicket};
use bucketwatch_core::client::MailStore;
use bucketwatch_core::config::Config;
use bucketwatch_core::Error;
use cosmic::app::Task;

use super::{AppModel, Message};

impl AppModel {
    pub(super) fn handle_sync(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::MailboxInputChanged(value) => {
                self.mailbox_input = value;
            }

            Message::OpenMailbox => {
                let name = self.mailbox_input.trim().to_string();
                if name.is_empty() {
                    self.status_message = "Enter a mailbox name".into();
                    return Task::none();
                }
                return self.open_mailbox(name, None);
            }

            Message::Refresh => match self.cache.request_refresh() {
                Some(ticket) => return self.fetch_list(ticket),
                None if self.cache.mailbox().is_none() => {
                    self.status_message = "No mailbox open".into();
                }
                // Coalesced into the fetch already in flight.
                None => {}
            },

            Message::ToggleSortOrder => {
                let newest_first = !self.cache.newest_first();
                self.cache.set_newest_first(newest_first);
                self.config.newest_first = newest_first;
                if let Err(e) = Config::persist(|c| c.newest_first = newest_first) {
                    log::warn!("Failed to save sort order: {}", e);
                }
            }

            Message::ListLoaded { ticket, result } => {
                let mailbox = ticket.mailbox().to_string();
                let mut tasks = Vec::new();
                match self.cache.complete_refresh(ticket, result) {
                    RefreshOutcome::Applied { reselect, follow_up } => {
                        let gone = self
                            .selected
                            .as_ref()
                            .is_some_and(|id| !self.cache.contains(id));
                        if gone {
                            self.clear_selection();
                        }
                        self.status_message =
                            format!("{}: {} messages", mailbox, self.cache.len());
                        if let Some(next) = follow_up {
                            tasks.push(self.fetch_list(next));
                        }
                        if let Some(id) = reselect {
                            tasks.push(self.dispatch(Message::SelectMessage(id)));
                        }
                    }
                    RefreshOutcome::Failed { error, follow_up } => {
                        log::error!("Failed to load mailbox {}: {}", mailbox, error);
                        self.status_message = format!("Failed to load {mailbox}: {error}");
                        if let Some(next) = follow_up {
                            tasks.push(self.fetch_list(next));
                        }
                    }
                    RefreshOutcome::Stale => {}
                }
                return cosmic::task::batch(tasks);
            }

            _ => {}
        }
        Task::none()
    }

    /// Switch the list to `name`, optionally selecting `select` once loaded.
    pub(super) fn open_mailbox(&mut self, name: String, select: Option<String>) -> Task<Message> {
        self.clear_selection();
        let ticket = self.cache.open_mailbox(name.clone());
        if let Some(id) = select {
            self.cache.select_after_refresh(id);
        }
        self.status_message = format!("Loading {name}...");
        self.fetch_list(ticket)
    }

    pub(super) fn fetch_list(&self, ticket: RefreshTicket) -> Task<Message> {
        let client = self.client.clone();
        cosmic::task::future(async move {
            let result = match &client {
                Some(client) => client.list(ticket.mailbox()).await,
                None => Err(Error::Config("no mail server configured".into())),
            };
            Message::ListLoaded { ticket, result }
        })
    }
}
