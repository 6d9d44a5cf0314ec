//! Reconnecting websocket shared by the main and the voice gateway.
use futures::{Sink, Stream, ready};
use std::borrow::Cow;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_websockets::{CloseCode as WsCloseCode, Message as WsMessage};
use tracing::{debug, trace, warn};
use twilight_model::gateway::CloseFrame;

use super::internal::{ConnectionFuture, Wrapper, WsConnection as Connection};

pub mod error;

pub use self::error::{SocketError, SocketErrorType};

/// Longest wait between two connection attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(64);

const ABNORMAL_CLOSE: CloseFrame<'static> = CloseFrame::new(1006, "");

#[derive(Debug)]
enum Message {
    Close(CloseFrame<'static>),
    Text(String),
}

/// This type allows to determine the cause of closure of connection.
#[derive(Debug)]
enum DisconnectCause {
    /// Gateway initiated the close.
    Gateway { code: Option<u16> },

    /// The user initiated the close.
    User { code: u16, reconnect: bool },

    /// Transport error initiated the close.
    Transport,
}

/// Determines the current state of [`GatewaySocket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connected,

    /// Not connected, the next poll reconnects.
    Disconnected,

    /// Permanently closed, the stream is exhausted.
    Closed,
}

impl SocketState {
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Events emitted by [`GatewaySocket`].
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// A new websocket connection has been established.
    Opened,

    /// Text frame received from the gateway.
    Text(String),

    /// The connection went away.
    ///
    /// `reconnecting` is `false` if the close code tells that trying
    /// again is pointless.
    Closed {
        frame: Option<CloseFrame<'static>>,
        reconnecting: bool,
    },
}

/// Websocket connection to a gateway that keeps reconnecting until the
/// gateway closes it with a fatal close code.
///
/// It does not know anything about the protocol spoken over it, the
/// [session] on top of it handles heartbeats and handshakes.
///
/// [session]: crate::net::SessionClient
#[derive(Debug)]
pub struct GatewaySocket {
    /// WebSocket connection, which may be connected to the gateway.
    connection: Option<Connection>,

    /// How many connections have attempted without successfully
    /// connected to the gateway.
    connect_attempts: u32,

    /// Classifies close codes after which reconnecting is allowed.
    can_reconnect: fn(u16) -> bool,

    /// URL of the gateway.
    endpoint: String,

    /// Future to establish a WebSocket connection with the gateway.
    future: Option<ConnectionFuture<Connection, SocketError>>,

    /// Queued outgoing text frames.
    message_tx: Wrapper<mpsc::UnboundedSender<String>>,
    message_rx: Wrapper<mpsc::UnboundedReceiver<String>>,

    /// Whether [`SocketEvent::Opened`] still has to be emitted.
    opened: bool,

    /// Message being sent to the gateway.
    pending: Option<Message>,

    /// Endpoint to switch to on the next connection.
    reconnect: Option<String>,

    state: SocketState,
}

impl GatewaySocket {
    /// Creates a socket for `endpoint`. It connects on the first poll.
    #[must_use]
    pub fn new(endpoint: String, can_reconnect: fn(u16) -> bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            connection: None,
            connect_attempts: 0,
            can_reconnect,
            endpoint,
            future: None,
            message_tx: Wrapper(tx),
            message_rx: Wrapper(rx),
            opened: false,
            pending: None,
            reconnect: None,
            state: SocketState::Disconnected,
        }
    }

    /// Queues to close the connection for good.
    pub fn close(&mut self, frame: CloseFrame<'static>) {
        let code = frame.code;
        self.pending = Some(Message::Close(frame));
        self.close_inner(DisconnectCause::User {
            code,
            reconnect: false,
        });
    }

    /// Gets the endpoint the socket connects to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Queues to restart the connection, with a new endpoint if it is `Some`.
    pub fn reconnect(&mut self, endpoint: Option<String>) {
        if endpoint.is_some() {
            self.reconnect = endpoint;
        }

        if self.connection.is_some() {
            self.pending = Some(Message::Close(CloseFrame::RESUME));
        }
        self.close_inner(DisconnectCause::User {
            code: CloseFrame::RESUME.code,
            reconnect: true,
        });
    }

    /// Queues a text frame to be sent to the gateway.
    pub fn send(&self, message: String) -> Result<(), SocketError> {
        self.message_tx.send(message).map_err(|source| SocketError {
            kind: SocketErrorType::Sending,
            source: Some(Box::new(source)),
        })
    }

    /// Sender half of the outgoing queue, usable from other tasks.
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.message_tx.0.clone()
    }

    /// Gets the current state of [`GatewaySocket`].
    #[must_use]
    pub fn state(&self) -> SocketState {
        self.state
    }

    /// Takes every message queued so far.
    #[cfg(test)]
    pub(crate) fn drain_queued(&mut self) -> Vec<String> {
        let mut queued = Vec::new();
        while let Ok(message) = self.message_rx.try_recv() {
            queued.push(message);
        }
        queued
    }
}

impl GatewaySocket {
    fn close_inner(&mut self, cause: DisconnectCause) {
        self.state = match cause {
            DisconnectCause::Transport => SocketState::Disconnected,
            DisconnectCause::Gateway { code } => self.state_from_close_code(code),
            DisconnectCause::User { reconnect: true, .. } => SocketState::Disconnected,
            DisconnectCause::User { code, .. } if matches!(code, 1000 | 1001) => {
                SocketState::Closed
            }
            DisconnectCause::User { code, .. } => self.state_from_close_code(Some(code)),
        };

        // Frames queued for the old connection belong to the old session.
        while self.message_rx.try_recv().is_ok() {}
    }

    fn state_from_close_code(&self, code: Option<u16>) -> SocketState {
        match code {
            Some(code) if !(self.can_reconnect)(code) => SocketState::Closed,
            _ => SocketState::Disconnected,
        }
    }

    fn backoff(&self) -> Duration {
        match self.connect_attempts {
            0 => Duration::ZERO,
            attempts => Duration::from_secs(2u64.saturating_pow(attempts)).min(MAX_BACKOFF),
        }
    }

    /// Attempts to send a pending message to the gateway.
    fn poll_send_pending(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), SocketError>> {
        let Some(ws) = self.connection.as_mut() else {
            self.pending = None;
            return Poll::Ready(Ok(()));
        };

        let Some(message) = self.pending.as_ref() else {
            return Poll::Ready(Ok(()));
        };

        let sending = |source: tokio_websockets::Error| SocketError {
            kind: SocketErrorType::Sending,
            source: Some(Box::new(source)),
        };

        ready!(Pin::new(&mut *ws).poll_ready(cx)).map_err(sending)?;
        let is_close = matches!(message, Message::Close(..));
        let message = match self.pending.take().expect("checked above") {
            Message::Close(frame) => {
                WsMessage::close(WsCloseCode::try_from(frame.code).ok(), &frame.reason)
            }
            Message::Text(text) => WsMessage::text(text),
        };
        Pin::new(&mut *ws).start_send(message).map_err(sending)?;
        ready!(Pin::new(&mut *ws).poll_flush(cx)).map_err(sending)?;

        if is_close {
            debug!("closed websocket connection");
            self.connection = None;
        }

        Poll::Ready(Ok(()))
    }

    /// Attempts to send due messages to the gateway.
    #[tracing::instrument(skip_all, name = "socket.poll_send", level = "trace")]
    fn poll_send(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), SocketError>> {
        loop {
            ready!(self.poll_send_pending(cx))?;
            if self.connection.is_none() {
                return Poll::Ready(Ok(()));
            }

            if let Poll::Ready(Some(message)) = self.message_rx.poll_recv(cx) {
                trace!(len = message.len(), "sending queued message");
                self.pending = Some(Message::Text(message));
                continue;
            }

            return Poll::Ready(Ok(()));
        }
    }

    /// Attempts to connect to the gateway.
    ///
    /// Returns `Ok(false)` once the socket is permanently closed.
    #[tracing::instrument(skip_all, name = "socket.poll_connect", level = "trace")]
    fn poll_connect(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool, SocketError>> {
        match self.state {
            SocketState::Closed => {
                _ = ready!(self.poll_send_pending(cx));
                self.connection = None;
                return Poll::Ready(Ok(false));
            }
            SocketState::Disconnected if self.connection.is_none() => {
                if let Some(endpoint) = self.reconnect.take() {
                    self.endpoint = endpoint;
                }

                if self.future.is_none() {
                    let backoff = self.backoff();
                    let url = self.endpoint.clone();
                    debug!(
                        attempts = self.connect_attempts,
                        ?backoff,
                        ?url,
                        "connecting to the gateway"
                    );

                    self.future = Some(ConnectionFuture::new(async move {
                        tokio::time::sleep(backoff).await;

                        let connector =
                            tokio_websockets::Connector::new().map_err(SocketError::connecting)?;
                        let (connection, _) = tokio_websockets::ClientBuilder::new()
                            .uri(&url)
                            .map_err(SocketError::connecting)?
                            .limits(tokio_websockets::Limits::unlimited())
                            .connector(&connector)
                            .connect()
                            .await
                            .map_err(SocketError::connecting)?;

                        Ok(connection)
                    }));
                }

                let result = ready!(
                    Pin::new(&mut self.future.as_mut().expect("future was just set").0).poll(cx)
                );

                self.future = None;
                match result {
                    Ok(connection) => {
                        self.connection = Some(connection);
                        self.connect_attempts = 0;
                        self.opened = true;
                        self.state = SocketState::Connected;
                    }
                    Err(error) => {
                        self.connect_attempts = self.connect_attempts.saturating_add(1);
                        return Poll::Ready(Err(error));
                    }
                }
            }
            _ => {}
        }

        Poll::Ready(Ok(true))
    }

    fn closed_event(&self, frame: Option<CloseFrame<'static>>) -> SocketEvent {
        SocketEvent::Closed {
            frame,
            reconnecting: !self.state.is_closed(),
        }
    }
}

impl Stream for GatewaySocket {
    type Item = Result<SocketEvent, SocketError>;

    #[tracing::instrument(skip_all, name = "socket.poll", fields(
        endpoint = %self.endpoint,
        state = ?self.state,
    ))]
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let message = loop {
            match ready!(self.poll_connect(cx)) {
                Ok(false) => return Poll::Ready(None),
                Ok(true) => {}
                Err(error) => return Poll::Ready(Some(Err(error))),
            }

            if std::mem::take(&mut self.opened) {
                return Poll::Ready(Some(Ok(SocketEvent::Opened)));
            }

            if let Err(error) = ready!(self.poll_send(cx)) {
                warn!(?error, "could not send message, reconnecting");
                self.close_inner(DisconnectCause::Transport);
                self.connection = None;
                return Poll::Ready(Some(Ok(self.closed_event(Some(ABNORMAL_CLOSE)))));
            }

            // closed by ourselves, go for the next connection.
            let Some(connection) = self.connection.as_mut() else {
                continue;
            };

            match ready!(Pin::new(connection).poll_next(cx)) {
                Some(Ok(message)) if message.is_close() => {
                    let frame = message.as_close().and_then(|(code, reason)| {
                        (code != WsCloseCode::NO_STATUS_RECEIVED).then(|| CloseFrame {
                            code: code.into(),
                            reason: Cow::Owned(reason.to_string()),
                        })
                    });
                    break Message::Close(frame.unwrap_or(ABNORMAL_CLOSE));
                }
                Some(Ok(message)) => {
                    if let Some(text) = message.as_text() {
                        break Message::Text(text.to_owned());
                    }
                }
                Some(Err(error)) => {
                    debug!(?error, "websocket connection errored");
                    self.close_inner(DisconnectCause::Transport);
                    self.connection = None;
                    return Poll::Ready(Some(Ok(self.closed_event(Some(ABNORMAL_CLOSE)))));
                }
                None => {
                    debug!("websocket connection ended");
                    self.close_inner(DisconnectCause::Transport);
                    self.connection = None;
                    return Poll::Ready(Some(Ok(self.closed_event(None))));
                }
            }
        };

        match message {
            Message::Close(frame) => {
                debug!(?frame, "received websocket close message");
                self.connection = None;
                self.close_inner(DisconnectCause::Gateway {
                    code: Some(frame.code),
                });
                Poll::Ready(Some(Ok(self.closed_event(Some(frame)))))
            }
            Message::Text(text) => Poll::Ready(Some(Ok(SocketEvent::Text(text)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use turntable_types::GatewayCloseCode;

    fn gateway_can_reconnect(code: u16) -> bool {
        GatewayCloseCode::try_from(code).map_or(true, |code| code.can_reconnect())
    }

    #[test]
    fn backoff_grows_and_caps() {
        let mut socket = GatewaySocket::new("ws://localhost".into(), gateway_can_reconnect);
        assert_eq!(socket.backoff(), Duration::ZERO);

        socket.connect_attempts = 1;
        assert_eq!(socket.backoff(), Duration::from_secs(2));

        socket.connect_attempts = 3;
        assert_eq!(socket.backoff(), Duration::from_secs(8));

        socket.connect_attempts = 40;
        assert_eq!(socket.backoff(), MAX_BACKOFF);
    }

    #[test]
    fn fatal_close_codes_close_for_good() {
        let mut socket = GatewaySocket::new("ws://localhost".into(), gateway_can_reconnect);
        socket.close_inner(DisconnectCause::Gateway { code: Some(4000) });
        assert_eq!(socket.state(), SocketState::Disconnected);

        socket.close_inner(DisconnectCause::Gateway { code: Some(4004) });
        assert!(socket.state().is_closed());
    }

    #[test]
    fn reconnect_drops_stale_messages() {
        let mut socket = GatewaySocket::new("ws://localhost".into(), gateway_can_reconnect);
        socket.send("stale".to_string()).unwrap();
        socket.reconnect(Some("ws://elsewhere".into()));

        assert_eq!(socket.state(), SocketState::Disconnected);
        assert!(socket.message_rx.try_recv().is_err());
        assert_eq!(socket.reconnect.as_deref(), Some("ws://elsewhere"));
    }

    #[tokio::test]
    async fn closed_socket_ends_stream() {
        let mut socket = GatewaySocket::new("ws://localhost".into(), gateway_can_reconnect);
        socket.close(CloseFrame::NORMAL);
        assert!(socket.next().await.is_none());
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        // nothing listens on the discard port
        let mut socket = GatewaySocket::new("ws://127.0.0.1:9".into(), gateway_can_reconnect);
        let error = socket.next().await.unwrap().unwrap_err();
        assert!(matches!(error.kind(), SocketErrorType::Connecting));
        assert_eq!(socket.connect_attempts, 1);
    }
}
