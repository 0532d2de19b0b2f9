use bucketwatch_core::models::MessageDetail;
use cosmic::iced::Length;
use cosmic::widget;
use cosmic::Element;

use crate::app::Message;

/// Render the message preview pane with an action toolbar.
pub fn view(detail: Option<&MessageDetail>) -> Element<'_, Message> {
    let Some(detail) = detail else {
        return widget::container(widget::text::body("Select a message to read"))
            .padding(16)
            .width(Length::Fill)
            .height(Length::Fill)
            .into();
    };
    let msg = &detail.summary;

    let mut col = widget::column().spacing(0);

    let mut html_btn = widget::button::text("View HTML");
    if detail.has_html() {
        html_btn = html_btn.on_press(Message::ViewHtml);
    }
    let toolbar = widget::row()
        .spacing(8)
        .push(html_btn)
        .push(widget::button::text("View Source").on_press(Message::ViewSource))
        .push(widget::button::destructive("Delete").on_press(Message::DeleteSelected));
    col = col.push(widget::container(toolbar).padding([8, 16]).width(Length::Fill));

    let mut headers = widget::column()
        .spacing(2)
        .push(widget::text::heading(msg.display_subject()))
        .push(widget::text::caption(format!("From: {}", msg.from)));
    if !msg.to.is_empty() {
        headers = headers.push(widget::text::caption(format!("To: {}", msg.to.join(", "))));
    }
    headers = headers
        .push(widget::text::caption(format!("Date: {}", msg.display_date())))
        .push(widget::text::caption(format!(
            "Size: {}",
            human_size(msg.size.max(0) as u64)
        )));
    col = col.push(widget::container(headers).padding([8, 16]).width(Length::Fill));

    col = col.push(
        widget::container(widget::text::body(detail.display_body()))
            .padding(16)
            .width(Length::Fill),
    );

    // Attachments section
    if !detail.attachments.is_empty() {
        let mut att_col = widget::column().spacing(8);
        att_col = att_col.push(widget::text::heading(format!(
            "Attachments ({})",
            detail.attachments.len()
        )));

        for (i, att) in detail.attachments.iter().enumerate() {
            let info = widget::row()
                .spacing(8)
                .align_y(cosmic::iced::Alignment::Center)
                .push(
                    widget::text::body(format!("{} ({})", att.filename, att.content_type))
                        .width(Length::Fill),
                )
                .push(widget::button::suggested("Open").on_press(Message::OpenAttachment(i)));

            att_col = att_col.push(
                widget::container(info)
                    .padding(8)
                    .width(Length::Fill)
                    .class(cosmic::style::Container::Card),
            );
        }

        col = col.push(widget::container(att_col).padding([8, 16]).width(Length::Fill));
    }

    widget::scrollable(col)
        .height(Length::Fill)
        .width(Length::Fill)
        .into()
}

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
