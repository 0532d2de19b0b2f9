use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Result;

/// A payload-bearing frame read off a push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(data) => data,
        }
    }
}

/// Opens push connections. Implemented over WebSocket in production and by
/// an in-memory fake in tests.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, target: Url) -> BoxFuture<'static, Result<Box<dyn Link>>>;
}

/// One open push connection.
pub trait Link: Send {
    /// Next payload frame; `None` once the peer has closed the connection.
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<Frame>>>;

    /// Close from our side. Errors are logged, not returned: the connection is
    /// gone either way.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn connect(&self, target: Url) -> BoxFuture<'static, Result<Box<dyn Link>>> {
        async move {
            log::debug!("Opening monitor socket {}", target);
            let (stream, response) = tokio_tungstenite::connect_async(target.as_str()).await?;
            log::debug!("Monitor socket upgraded: HTTP {}", response.status());
            Ok(Box::new(WsLink { stream }) as Box<dyn Link>)
        }
        .boxed()
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Link for WsLink {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<Frame>>> {
        async move {
            while let Some(msg) = self.stream.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => return Some(Ok(Frame::Text(text.to_string()))),
                    Ok(WsMessage::Binary(data)) => return Some(Ok(Frame::Binary(data.to_vec()))),
                    Ok(WsMessage::Close(frame)) => {
                        log::debug!("Monitor socket closed by server: {:?}", frame);
                        return None;
                    }
                    // Ping/pong are answered by tungstenite itself.
                    Ok(_) => continue,
                    Err(e) => return Some(Err(e.into())),
                }
            }
            None
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        async move {
            if let Err(e) = self.stream.close(None).await {
                log::debug!("Monitor socket close: {}", e);
            }
        }
        .boxed()
    }
}
