use cosmic::app::Task;
use cosmic::widget;

use super::{AppModel, Message};

impl AppModel {
    pub(super) fn handle_search(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SearchActivate => {
                if self.search_focused {
                    return Task::none();
                }
                self.search_focused = true;
                return widget::text_input::focus(crate::ui::message_list::search_input_id());
            }

            Message::SearchQueryChanged(q) => {
                self.search_focused = true;
                self.search_query = q.clone();
                let ticket = self.search_trigger.schedule(q);
                return cosmic::task::future(async move {
                    tokio::time::sleep_until(ticket.deadline()).await;
                    Message::SearchTick(ticket)
                });
            }

            Message::SearchTick(ticket) => {
                if let Some(criteria) = self.search_trigger.fire(ticket) {
                    self.apply_criteria(criteria);
                }
            }

            Message::SearchCommit => {
                self.search_trigger.cancel();
                self.search_focused = false;
                self.apply_criteria(self.search_query.clone());
            }

            Message::SearchClear => {
                self.search_trigger.cancel();
                self.search_focused = false;
                if !self.search_query.is_empty() || !self.cache.criteria().is_empty() {
                    self.search_query.clear();
                    self.apply_criteria(String::new());
                }
            }

            _ => {}
        }
        Task::none()
    }

    fn apply_criteria(&mut self, criteria: String) {
        self.cache.set_criteria(criteria);
        let shown = self.cache.visible_indices().len();
        if self.cache.criteria().is_empty() {
            self.status_message = format!("{} messages", self.cache.len());
        } else {
            self.status_message = format!(
                "Search: {} of {} messages match \"{}\"",
                shown,
                self.cache.len(),
                self.cache.criteria()
            );
        }
    }
}
