use cosmic::app::Task;

use super::{AppModel, Message};

impl AppModel {
    pub(super) fn handle_navigation(&mut self, message: Message) -> Task<Message> {
        let visible = self.cache.visible_indices();
        if visible.is_empty() {
            return Task::none();
        }
        let current_vis_pos = self
            .selected
            .as_deref()
            .and_then(|id| self.cache.index_of(id))
            .and_then(|real| visible.iter().position(|&ri| ri == real));

        let new_vis_pos = match (message, current_vis_pos) {
            (Message::SelectionDown, Some(pos)) => (pos + 1).min(visible.len() - 1),
            (Message::SelectionUp, Some(pos)) => pos.saturating_sub(1),
            (Message::SelectionDown | Message::SelectionUp, None) => 0,
            _ => return Task::none(),
        };
        if Some(new_vis_pos) == current_vis_pos {
            return Task::none();
        }

        let id = visible
            .get(new_vis_pos)
            .and_then(|&real| self.cache.get_index(real))
            .map(|m| m.id.clone());
        match id {
            Some(id) => self.dispatch(Message::SelectMessage(id)),
            None => Task::none(),
        }
    }
}
