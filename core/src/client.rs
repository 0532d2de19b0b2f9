//! HTTP client for the mail store's REST interface.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::error::{Error, Result};
use crate::models::{MessageDetail, MessageSummary};

/// The slice of the mail store the list cache depends on.
pub trait MailStore: Send + Sync {
    fn list(&self, mailbox: &str) -> impl Future<Output = Result<Vec<MessageSummary>>> + Send;

    fn delete(&self, mailbox: &str, id: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
}

impl RestClient {
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(Error::Address(format!("{base} cannot be a base URL")));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RestClient { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| Error::Address(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(["api", "v1", "mailbox"])
            .extend(segments);
        Ok(url)
    }

    pub fn mailbox_url(&self, mailbox: &str) -> Result<Url> {
        self.endpoint(&[mailbox])
    }

    pub fn message_url(&self, mailbox: &str, id: &str) -> Result<Url> {
        self.endpoint(&[mailbox, id])
    }

    /// Raw RFC 822 source, suitable for handing to a browser.
    pub fn source_url(&self, mailbox: &str, id: &str) -> Result<Url> {
        self.endpoint(&[mailbox, id, "source"])
    }

    pub async fn get_message(&self, mailbox: &str, id: &str) -> Result<MessageDetail> {
        let url = self.message_url(mailbox, id)?;
        log::debug!("GET {}", url);
        let resp = check(self.http.get(url).send().await?)?;
        Ok(resp.json().await?)
    }

    pub async fn mark_seen(&self, mailbox: &str, id: &str) -> Result<()> {
        let url = self.message_url(mailbox, id)?;
        log::debug!("PATCH {}", url);
        let resp = self
            .http
            .patch(url)
            .json(&serde_json::json!({ "seen": true }))
            .send()
            .await?;
        check(resp)?;
        Ok(())
    }

    /// Delete every message in `mailbox`.
    pub async fn purge_mailbox(&self, mailbox: &str) -> Result<()> {
        let url = self.mailbox_url(mailbox)?;
        log::info!("Purging mailbox {}", mailbox);
        check(self.http.delete(url).send().await?)?;
        Ok(())
    }
}

impl MailStore for RestClient {
    async fn list(&self, mailbox: &str) -> Result<Vec<MessageSummary>> {
        let url = self.mailbox_url(mailbox)?;
        log::debug!("GET {}", url);
        let resp = check(self.http.get(url).send().await?)?;
        Ok(resp.json().await?)
    }

    async fn delete(&self, mailbox: &str, id: &str) -> Result<()> {
        let url = self.message_url(mailbox, id)?;
        log::debug!("DELETE {}", url);
        check(self.http.delete(url).send().await?)?;
        Ok(())
    }
}

fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    match status_error(resp.status(), resp.url()) {
        Some(e) => Err(e),
        None => Ok(resp),
    }
}

fn status_error(status: StatusCode, url: &Url) -> Option<Error> {
    if status == StatusCode::NOT_FOUND {
        Some(Error::NotFound(url.to_string()))
    } else if !status.is_success() {
        Some(Error::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    } else {
        None
    }
}
