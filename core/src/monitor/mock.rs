//! In-memory transport for exercising the connector without a server.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use url::Url;

use super::transport::{Frame, Link, Transport};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Open(String),
    Close(String),
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    feeds: Vec<mpsc::UnboundedSender<Option<Frame>>>,
    refuse: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub(crate) fn opens(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Open(_)))
            .count()
    }

    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.inner.lock().unwrap().refuse = refuse;
    }

    /// Deliver a frame on the most recently opened link.
    pub(crate) fn push(&self, frame: Frame) {
        if let Some(feed) = self.inner.lock().unwrap().feeds.last() {
            let _ = feed.send(Some(frame));
        }
    }

    /// Close the most recently opened link from the server side.
    pub(crate) fn hang_up(&self) {
        if let Some(feed) = self.inner.lock().unwrap().feeds.last() {
            let _ = feed.send(None);
        }
    }
}

impl Transport for MockTransport {
    fn connect(&self, target: Url) -> BoxFuture<'static, Result<Box<dyn Link>>> {
        let inner = self.inner.clone();
        async move {
            let frames = {
                let mut state = inner.lock().unwrap();
                if state.refuse {
                    return Err(Error::Transport("connection refused".into()));
                }
                state.calls.push(Call::Open(target.to_string()));
                let (tx, rx) = mpsc::unbounded_channel();
                state.feeds.push(tx);
                rx
            };
            Ok(Box::new(MockLink {
                target: target.to_string(),
                frames,
                inner,
            }) as Box<dyn Link>)
        }
        .boxed()
    }
}

struct MockLink {
    target: String,
    frames: mpsc::UnboundedReceiver<Option<Frame>>,
    inner: Arc<Mutex<MockState>>,
}

impl Link for MockLink {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<Frame>>> {
        async move {
            match self.frames.recv().await {
                Some(Some(frame)) => Some(Ok(frame)),
                _ => None,
            }
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        async {}.boxed()
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.lock() {
            state.calls.push(Call::Close(self.target.clone()));
        }
    }
}
