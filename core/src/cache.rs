//! Authoritative in-memory copy of the displayed mailbox.
//!
//! The collection is only ever replaced wholesale by a refresh. Deletions go
//! through the store and are followed by a refresh; notifications only
//! trigger refreshes. Fetches for one mailbox never overlap: a refresh
//! requested while one is in flight is queued and issued as a single
//! follow-up when the in-flight one completes.
//!
//! The split API (`request_refresh` / `complete_refresh`) is what an event
//! loop uses: it issues the fetch itself and feeds the result back. The
//! async `refresh` / `remove` helpers drive the same state machine against a
//! [`MailStore`] directly.

use indexmap::IndexMap;

use crate::client::MailStore;
use crate::error::{Error, Result};
use crate::models::MessageSummary;
use crate::search::{apply_search, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unloaded,
    Loading,
    Loaded,
}

/// Identifies one issued fetch. Results carrying an outdated ticket are
/// discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    mailbox: String,
    generation: u64,
}

impl RefreshTicket {
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied {
        /// Message to re-select, if one was requested and survived the reload.
        reselect: Option<String>,
        follow_up: Option<RefreshTicket>,
    },
    Failed {
        error: Error,
        follow_up: Option<RefreshTicket>,
    },
    /// The result belonged to a superseded fetch and was ignored.
    Stale,
}

impl RefreshOutcome {
    pub fn follow_up(&self) -> Option<&RefreshTicket> {
        match self {
            RefreshOutcome::Applied { follow_up, .. } | RefreshOutcome::Failed { follow_up, .. } => {
                follow_up.as_ref()
            }
            RefreshOutcome::Stale => None,
        }
    }
}

pub struct MessageListCache {
    mailbox: Option<String>,
    messages: IndexMap<String, MessageSummary>,
    phase: Phase,
    /// Whether `messages` holds a successful load for the current mailbox.
    loaded: bool,
    generation: u64,
    in_flight: Option<u64>,
    reload_queued: bool,
    pending_selection: Option<String>,
    newest_first: bool,
    criteria: String,
    visibility: Visibility,
}

impl MessageListCache {
    pub fn new(newest_first: bool) -> Self {
        MessageListCache {
            mailbox: None,
            messages: IndexMap::new(),
            phase: Phase::Unloaded,
            loaded: false,
            generation: 0,
            in_flight: None,
            reload_queued: false,
            pending_selection: None,
            newest_first,
            criteria: String::new(),
            visibility: Vec::new(),
        }
    }

    pub fn mailbox(&self) -> Option<&str> {
        self.mailbox.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageSummary> {
        self.messages.values()
    }

    pub fn get(&self, id: &str) -> Option<&MessageSummary> {
        self.messages.get(id)
    }

    pub fn get_index(&self, index: usize) -> Option<&MessageSummary> {
        self.messages.get_index(index).map(|(_, m)| m)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.messages.get_index_of(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn newest_first(&self) -> bool {
        self.newest_first
    }

    pub fn set_newest_first(&mut self, newest_first: bool) {
        if self.newest_first == newest_first {
            return;
        }
        self.newest_first = newest_first;
        self.messages = std::mem::take(&mut self.messages).into_iter().rev().collect();
        self.recompute_visibility();
    }

    /// Switch to `name`. Clears the collection, any pending re-selection and
    /// queued reload; results still in flight for the old mailbox go stale.
    pub fn open_mailbox(&mut self, name: impl Into<String>) -> RefreshTicket {
        let name = name.into();
        log::debug!("Opening mailbox {}", name);
        self.mailbox = Some(name);
        self.messages.clear();
        self.visibility.clear();
        self.loaded = false;
        self.reload_queued = false;
        self.pending_selection = None;
        self.issue()
    }

    /// Ask for a reload of the current mailbox. Returns the ticket to fetch
    /// with, or `None` if there is no mailbox or the request was queued
    /// behind a fetch already in flight.
    pub fn request_refresh(&mut self) -> Option<RefreshTicket> {
        self.mailbox.as_ref()?;
        if self.in_flight.is_some() {
            log::debug!("Refresh already in flight, queueing follow-up");
            self.reload_queued = true;
            return None;
        }
        Some(self.issue())
    }

    fn issue(&mut self) -> RefreshTicket {
        self.generation += 1;
        self.in_flight = Some(self.generation);
        self.phase = Phase::Loading;
        RefreshTicket {
            mailbox: self.mailbox.clone().unwrap_or_default(),
            generation: self.generation,
        }
    }

    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<MessageSummary>>,
    ) -> RefreshOutcome {
        let current = self.in_flight == Some(ticket.generation)
            && self.mailbox.as_deref() == Some(ticket.mailbox.as_str());
        if !current {
            log::debug!("Discarding stale list for mailbox {}", ticket.mailbox);
            return RefreshOutcome::Stale;
        }
        self.in_flight = None;

        let follow_up = if std::mem::take(&mut self.reload_queued) {
            Some(self.issue())
        } else {
            None
        };

        match result {
            Ok(rows) => {
                self.replace(rows);
                self.loaded = true;
                if follow_up.is_none() {
                    self.phase = Phase::Loaded;
                }
                let reselect = self
                    .pending_selection
                    .take()
                    .filter(|id| self.messages.contains_key(id));
                RefreshOutcome::Applied { reselect, follow_up }
            }
            Err(error) => {
                log::warn!("Refresh of mailbox {} failed: {}", ticket.mailbox, error);
                if follow_up.is_none() {
                    self.phase = if self.loaded {
                        Phase::Loaded
                    } else {
                        Phase::Unloaded
                    };
                }
                RefreshOutcome::Failed { error, follow_up }
            }
        }
    }

    fn replace(&mut self, rows: Vec<MessageSummary>) {
        let mut messages = IndexMap::with_capacity(rows.len());
        for row in rows {
            messages.insert(row.id.clone(), row);
        }
        if self.newest_first {
            messages = messages.into_iter().rev().collect();
        }
        self.messages = messages;
        self.recompute_visibility();
    }

    /// Select `id` once the next refresh has landed, if it is present then.
    pub fn select_after_refresh(&mut self, id: impl Into<String>) {
        self.pending_selection = Some(id.into());
    }

    /// Account for a finished delete. A message that was already gone counts
    /// as deleted. On success the list must be reloaded: the returned ticket
    /// (if any) is the fetch to issue.
    pub fn settle_removal(&mut self, result: Result<()>) -> Result<Option<RefreshTicket>> {
        match result {
            Ok(()) => Ok(self.request_refresh()),
            Err(Error::NotFound(what)) => {
                log::info!("{} was already deleted", what);
                Ok(self.request_refresh())
            }
            Err(e) => Err(e),
        }
    }

    /// Record that `id` has been read.
    pub fn set_seen(&mut self, id: &str) {
        if let Some(message) = self.messages.get_mut(id) {
            message.seen = true;
        }
    }

    /// Reload the current mailbox, following any queued reloads. Returns the
    /// message to re-select, if one was requested.
    pub async fn refresh<S: MailStore>(&mut self, store: &S) -> Result<Option<String>> {
        if self.mailbox.is_none() {
            return Err(Error::NoMailbox);
        }
        match self.request_refresh() {
            Some(ticket) => self.drive(store, ticket).await,
            None => Ok(None),
        }
    }

    /// Delete `id` through the store, then reload. A failed delete leaves the
    /// cache untouched.
    pub async fn remove<S: MailStore>(&mut self, store: &S, id: &str) -> Result<()> {
        let mailbox = self.mailbox.clone().ok_or(Error::NoMailbox)?;
        log::info!("Deleting message {} from {}", id, mailbox);
        let result = store.delete(&mailbox, id).await;
        if let Some(ticket) = self.settle_removal(result)? {
            self.drive(store, ticket).await?;
        }
        Ok(())
    }

    async fn drive<S: MailStore>(
        &mut self,
        store: &S,
        mut ticket: RefreshTicket,
    ) -> Result<Option<String>> {
        let mut reselect = None;
        loop {
            let result = store.list(ticket.mailbox()).await;
            match self.complete_refresh(ticket, result) {
                RefreshOutcome::Applied {
                    reselect: found,
                    follow_up,
                } => {
                    reselect = found.or(reselect);
                    match follow_up {
                        Some(next) => ticket = next,
                        None => return Ok(reselect),
                    }
                }
                RefreshOutcome::Failed { error, follow_up } => match follow_up {
                    Some(next) => ticket = next,
                    None => return Err(error),
                },
                RefreshOutcome::Stale => return Ok(reselect),
            }
        }
    }

    pub fn criteria(&self) -> &str {
        &self.criteria
    }

    /// Set the search text and recompute visibility. Never touches the
    /// collection.
    pub fn set_criteria(&mut self, criteria: impl Into<String>) {
        self.criteria = criteria.into();
        self.recompute_visibility();
    }

    fn recompute_visibility(&mut self) {
        self.visibility = apply_search(self.messages.values(), &self.criteria);
    }

    pub fn visibility(&self) -> &[bool] {
        &self.visibility
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.visibility.get(index).copied().unwrap_or(false)
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        self.visibility
            .iter()
            .enumerate()
            .filter_map(|(i, visible)| visible.then_some(i))
            .collect()
    }

    pub fn visible(&self) -> impl Iterator<Item = &MessageSummary> {
        self.messages
            .values()
            .zip(self.visibility.iter())
            .filter_map(|(m, visible)| visible.then_some(m))
    }
}
