use bucketwatch_core::cache::{MessageListCache, Phase};
use cosmic::iced::Length;
use cosmic::widget;
use cosmic::Element;

use crate::app::Message;

pub fn search_input_id() -> widget::Id {
    widget::Id::new("search-input")
}

/// Render the search box, list toolbar and the visible rows of the open mailbox.
pub fn view<'a>(
    cache: &'a MessageListCache,
    selected: Option<&str>,
    search_query: &'a str,
) -> Element<'a, Message> {
    let mut col = widget::column().spacing(2).padding(8);

    let input = widget::text_input("Search subject or sender...", search_query)
        .on_input(Message::SearchQueryChanged)
        .on_submit(|_| Message::SearchCommit)
        .id(search_input_id());
    let has_mailbox = cache.mailbox().is_some();
    let order_label = if cache.newest_first() {
        "Newest first"
    } else {
        "Oldest first"
    };
    let order_btn = widget::button::text(order_label).on_press(Message::ToggleSortOrder);
    let mut refresh_btn = widget::button::text("Refresh");
    let mut purge_btn = widget::button::destructive("Purge");
    if has_mailbox {
        refresh_btn = refresh_btn.on_press(Message::Refresh);
        if !cache.is_empty() {
            purge_btn = purge_btn.on_press(Message::Purge);
        }
    }
    col = col.push(
        widget::row()
            .push(widget::container(input).width(Length::Fill))
            .push(order_btn)
            .push(refresh_btn)
            .push(purge_btn)
            .spacing(4)
            .align_y(cosmic::iced::Alignment::Center),
    );
    col = col.push(widget::vertical_space().height(4));

    if cache.is_empty() {
        let placeholder = match (cache.mailbox(), cache.phase()) {
            (None, _) => "Open a mailbox to see its messages",
            (Some(_), Phase::Loading) => "Loading...",
            (Some(_), Phase::Unloaded) => "Mailbox could not be loaded",
            (Some(_), Phase::Loaded) => "No messages",
        };
        col = col.push(widget::text::body(placeholder));
    } else {
        let mut shown = 0;
        for msg in cache.visible() {
            shown += 1;
            let unread = if msg.seen { "" } else { "● " };
            let subject = widget::text::body(format!("{}{}", unread, msg.display_subject()));
            let meta = widget::text::caption(format!("{}  ·  {}", msg.from, msg.display_date()));

            let row_content = widget::column().push(subject).push(meta).spacing(2);
            let mut btn = widget::button::custom(widget::container(row_content).padding([2, 4]))
                .on_press(Message::SelectMessage(msg.id.clone()))
                .width(Length::Fill);

            if selected == Some(msg.id.as_str()) {
                btn = btn.class(cosmic::theme::Button::Suggested);
            }
            col = col.push(btn);
        }
        if shown == 0 {
            col = col.push(widget::text::body("No messages match the search"));
        }
    }

    widget::scrollable(col).height(Length::Fill).into()
}
