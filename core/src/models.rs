use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Deserializer, Serialize};

/// The server sends `null` for a message with no recipients.
fn null_as_empty<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(de)?.unwrap_or_default())
}

/// Summary of a message for the list view (no body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub mailbox: String,
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub seen: bool,
}

impl MessageSummary {
    pub fn display_subject(&self) -> &str {
        display_subject(&self.subject)
    }

    pub fn display_date(&self) -> String {
        display_date(self.date.as_ref())
    }
}

/// Full message as returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub summary: MessageSummary,
    #[serde(default)]
    pub body: MessageBody,
    #[serde(default)]
    pub header: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MessageDetail {
    pub fn has_html(&self) -> bool {
        !self.body.html.trim().is_empty()
    }

    /// Text to show in the preview pane. Falls back to a marker when the
    /// message only has an HTML part.
    pub fn display_body(&self) -> &str {
        if !self.body.text.trim().is_empty() {
            &self.body.text
        } else if self.has_html() {
            "[HTML-only message: use View HTML]"
        } else {
            "[No displayable content]"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
}

/// An email attachment, addressed by server links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(rename = "content-type", default)]
    pub content_type: String,
    #[serde(rename = "download-link", default)]
    pub download_link: String,
    #[serde(rename = "view-link", default)]
    pub view_link: String,
    #[serde(default)]
    pub md5: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    #[default]
    Stored,
    Deleted,
}

/// A push notification received from the monitor endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub kind: NotificationKind,
    pub mailbox: String,
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub size: i64,
}

impl Notification {
    pub fn display_subject(&self) -> &str {
        display_subject(&self.subject)
    }

    pub fn display_date(&self) -> String {
        display_date(self.date.as_ref())
    }
}

fn display_subject(subject: &str) -> &str {
    if subject.trim().is_empty() {
        "(No Subject)"
    } else {
        subject
    }
}

fn display_date(date: Option<&DateTime<FixedOffset>>) -> String {
    match date {
        Some(d) => d.with_timezone(&Local).format("%b %e, %Y %H:%M").to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_from_server_json() {
        let json = r#"{
            "mailbox": "swaks",
            "id": "20180107T224128-0000",
            "from": "<jamehi03@server.com>",
            "to": ["<swaks@inbucket.local>"],
            "subject": "test Sun, 07 Jan 2018 14:41:28 -0800",
            "date": "2018-01-07T14:41:28.123-08:00",
            "posix-millis": 1515364888123,
            "size": 635,
            "seen": true
        }"#;
        let msg: MessageSummary = serde_json::from_str(json).unwrap();
        assert_eq!(msg.mailbox, "swaks");
        assert_eq!(msg.id, "20180107T224128-0000");
        assert_eq!(msg.to.len(), 1);
        assert_eq!(msg.size, 635);
        assert!(msg.seen);
        assert!(msg.date.is_some());
    }

    #[test]
    fn summary_missing_optional_fields() {
        let msg: MessageSummary = serde_json::from_str(r#"{"mailbox":"a","id":"1"}"#).unwrap();
        assert_eq!(msg.display_subject(), "(No Subject)");
        assert_eq!(msg.display_date(), "");
        assert!(!msg.seen);
    }

    #[test]
    fn null_recipients_are_empty() {
        let msg: MessageSummary =
            serde_json::from_str(r#"{"mailbox":"swaks","id":"0001","to":null}"#).unwrap();
        assert!(msg.to.is_empty());

        let n: Notification = serde_json::from_str(
            r#"{"mailbox":"swaks","id":"0001","from":"a@x.com","to":null,"subject":"Hi"}"#,
        )
        .unwrap();
        assert!(n.to.is_empty());
        assert_eq!(n.subject, "Hi");
    }

    #[test]
    fn detail_flattens_summary() {
        let json = r#"{
            "mailbox": "box",
            "id": "7",
            "from": "a@x.com",
            "subject": "Hi",
            "body": {"text": "hello", "html": "<p>hello</p>"},
            "header": {"X-Test": ["1"]},
            "attachments": [{
                "filename": "a.txt",
                "content-type": "text/plain",
                "download-link": "http://h/a",
                "view-link": "http://h/v",
                "md5": "abc"
            }]
        }"#;
        let detail: MessageDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.summary.id, "7");
        assert_eq!(detail.display_body(), "hello");
        assert_eq!(detail.attachments[0].content_type, "text/plain");
        assert_eq!(detail.header["X-Test"], vec!["1".to_string()]);
    }

    #[test]
    fn html_only_body_marker() {
        let detail: MessageDetail = serde_json::from_str(
            r#"{"mailbox":"b","id":"1","body":{"text":"  ","html":"<b>x</b>"}}"#,
        )
        .unwrap();
        assert!(detail.display_body().contains("HTML-only"));
    }
}
