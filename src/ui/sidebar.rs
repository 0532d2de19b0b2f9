use std::collections::VecDeque;

use bucketwatch_core::bridge::RoutedNotification;
use cosmic::iced::Length;
use cosmic::widget;
use cosmic::Element;

use crate::app::{Message, MonitorState};

/// Render the sidebar: mailbox picker, monitor control and recent notifications.
pub fn view<'a>(
    mailbox_input: &'a str,
    open_mailbox: Option<&'a str>,
    monitor: MonitorState,
    notifications: &'a VecDeque<RoutedNotification>,
) -> Element<'a, Message> {
    let mut col = widget::column().spacing(4).padding(8);

    let input = widget::text_input("Mailbox name", mailbox_input)
        .on_input(Message::MailboxInputChanged)
        .on_submit(|_| Message::OpenMailbox);
    col = col.push(
        widget::row()
            .spacing(4)
            .align_y(cosmic::iced::Alignment::Center)
            .push(widget::container(input).width(Length::Fill))
            .push(widget::button::suggested("Open").on_press(Message::OpenMailbox)),
    );
    if let Some(name) = open_mailbox {
        col = col.push(widget::text::caption(format!("Viewing {name}")));
    }
    col = col.push(widget::vertical_space().height(8));

    // Monitor status + toggle
    let (status_icon, status_label) = match monitor {
        MonitorState::Connected => ("●", "Monitoring"),
        MonitorState::Connecting => ("◌", "Connecting..."),
        MonitorState::Disconnected => ("✖", "Disconnected"),
        MonitorState::Off => ("○", "Monitor off"),
    };
    col = col.push(widget::text::heading(format!("{status_icon} {status_label}")));

    let toggle = match monitor {
        MonitorState::Off => {
            widget::button::standard("Start monitoring").on_press(Message::ToggleMonitor(true))
        }
        _ => widget::button::standard("Stop monitoring").on_press(Message::ToggleMonitor(false)),
    };
    col = col.push(toggle.width(Length::Fill));

    if monitor == MonitorState::Disconnected {
        col = col.push(
            widget::button::custom(
                widget::container(widget::text::caption("Connection lost (retry)")).padding([2, 8]),
            )
            .on_press(Message::RetryMonitor)
            .class(cosmic::theme::Button::Text)
            .width(Length::Fill),
        );
    }

    col = col.push(widget::vertical_space().height(8));

    // Recent notifications, newest first
    let header = widget::row()
        .spacing(4)
        .align_y(cosmic::iced::Alignment::Center)
        .push(
            widget::text::heading(format!("New mail ({})", notifications.len()))
                .width(Length::Fill),
        )
        .push(widget::button::text("Clear").on_press(Message::ClearNotifications));
    col = col.push(header);

    if notifications.is_empty() {
        col = col.push(widget::text::caption("Nothing yet"));
    }
    for routed in notifications {
        let n = &routed.notification;
        let card = widget::column()
            .spacing(2)
            .push(widget::text::body(n.display_subject()))
            .push(widget::text::caption(format!("{}  ·  {}", n.mailbox, n.from)))
            .push(widget::text::caption(n.display_date()));
        col = col.push(
            widget::button::custom(widget::container(card).padding([4, 8]))
                .on_press(Message::NotificationClicked(routed.href.clone()))
                .class(cosmic::theme::Button::Text)
                .width(Length::Fill),
        );
    }

    widget::scrollable(col).height(Length::Fill).into()
}
