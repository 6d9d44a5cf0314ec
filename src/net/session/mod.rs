//! Reconnectable, sequenced gateway session shared by both gateways.
use futures::{Stream, StreamExt, ready};
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use twilight_model::gateway::CloseFrame;

use super::internal::Wrapper;
use super::socket::{GatewaySocket, SocketEvent};

pub mod error;
pub mod heartbeater;
pub mod protocol;
pub mod state;

pub use self::error::{SessionError, SessionErrorType};
pub use self::heartbeater::Heartbeater;
pub use self::protocol::{Frame, Protocol, encode};
pub use self::state::{Handshake, Resumable, ResumeToken, Session, SessionState};

type Handler<E> = Box<dyn FnMut(&E) + Send>;

/// Events emitted by [`SessionClient`].
#[derive(Debug)]
pub enum SessionEvent<E> {
    /// A dispatch, already routed to the registered handlers.
    Dispatch(E),

    /// The connection went away. Unless `reconnecting` is `false`, a new
    /// connection is attempted on the next poll and the session resumed.
    Disconnected {
        frame: Option<CloseFrame<'static>>,
        reconnecting: bool,
    },
}

/// Sends payloads to a [`SessionClient`] from anywhere.
///
/// Payloads are held back until the session is ready, so they never
/// race the handshake of a new connection.
pub struct SessionSender<P: Protocol> {
    tx: mpsc::UnboundedSender<String>,
    phantom: PhantomData<fn() -> P>,
}

impl<P: Protocol> SessionSender<P> {
    pub fn send<T: Serialize>(&self, opcode: P::OpCode, payload: &T) -> Result<(), SessionError> {
        let message = encode(opcode, payload)?;
        self.tx.send(message).map_err(|source| SessionError {
            kind: SessionErrorType::Sending,
            source: Some(Box::new(source)),
        })
    }
}

impl<P: Protocol> Clone for SessionSender<P> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            phantom: PhantomData,
        }
    }
}

impl<P: Protocol> std::fmt::Debug for SessionSender<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSender")
            .field("protocol", &P::NAME)
            .finish_non_exhaustive()
    }
}

/// Gateway session running the hello, identify or resume, heartbeat and
/// dispatch cycle of a [`Protocol`] over a reconnecting [`GatewaySocket`].
///
/// Polling the stream drives everything, including heartbeats and
/// reconnections. It should be polled by exactly one task.
///
/// ```no_run
/// # use turntable::gateway::MainGateway;
/// # use turntable::net::{SessionClient, SessionEvent};
/// # use turntable::options::{GatewayConfig, Token};
/// # async fn run() {
/// use futures::StreamExt;
///
/// let config = GatewayConfig::new(Token::from("token"));
/// let mut session = SessionClient::connect(
///     MainGateway::new(config.clone()),
///     GatewayConfig::endpoint(&config.url),
/// );
/// while let Some(event) = session.next().await {
///     if let Ok(SessionEvent::Dispatch(event)) = event {
///         println!("{event:?}");
///     }
/// }
/// # }
/// ```
pub struct SessionClient<P: Protocol> {
    handlers: HashMap<P::Kind, Vec<Handler<P::Event>>>,
    heartbeater: Option<Heartbeater>,
    outgoing_tx: mpsc::UnboundedSender<String>,
    outgoing_rx: Wrapper<mpsc::UnboundedReceiver<String>>,
    protocol: P,
    session: Session,
    socket: GatewaySocket,
}

impl<P: Protocol> std::fmt::Debug for SessionClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("protocol", &P::NAME)
            .field("heartbeater", &self.heartbeater)
            .field("session", &self.session)
            .field("socket", &self.socket)
            .finish_non_exhaustive()
    }
}

impl<P: Protocol> SessionClient<P> {
    /// Creates a session against `endpoint`. Nothing happens until the
    /// stream is polled.
    #[must_use]
    pub fn connect(protocol: P, endpoint: String) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        Self {
            handlers: HashMap::new(),
            heartbeater: None,
            outgoing_tx,
            outgoing_rx: Wrapper(outgoing_rx),
            protocol,
            session: Session::new(),
            socket: GatewaySocket::new(endpoint, P::can_reconnect),
        }
    }

    /// Registers a handler called with every dispatch of type `kind`,
    /// before the dispatch is yielded by the stream.
    pub fn on_dispatch<F>(&mut self, kind: P::Kind, handler: F)
    where
        F: FnMut(&P::Event) + Send + 'static,
    {
        self.handlers
            .entry(kind)
            .or_default()
            .push(Box::new(handler));
    }

    /// Queues a payload, sent once the session is ready.
    pub fn send<T: Serialize>(&self, opcode: P::OpCode, payload: &T) -> Result<(), SessionError> {
        self.sender().send(opcode, payload)
    }

    #[must_use]
    pub fn sender(&self) -> SessionSender<P> {
        SessionSender {
            tx: self.outgoing_tx.clone(),
            phantom: PhantomData,
        }
    }

    /// Closes the connection for good. The stream ends afterwards.
    pub fn close(&mut self, frame: CloseFrame<'static>) {
        self.heartbeater = None;
        self.session.close();
        self.socket.close(frame);
    }

    #[must_use]
    pub fn heartbeater(&self) -> Option<&Heartbeater> {
        self.heartbeater.as_ref()
    }

    #[must_use]
    pub const fn protocol(&self) -> &P {
        &self.protocol
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state()
    }
}

impl<P: Protocol> SessionClient<P> {
    fn beat(&mut self) {
        let Some(heartbeater) = self.heartbeater.as_mut() else {
            return;
        };

        if heartbeater.record_sent() {
            warn!(gateway = P::NAME, "previous heartbeat was not acknowledged");
        }

        match self.protocol.heartbeat(self.session.sequence()) {
            Ok(payload) => {
                trace!(gateway = P::NAME, sequence = ?self.session.sequence(), "sending heartbeat");
                self.queue(payload);
            }
            Err(error) => warn!(?error, "could not serialize heartbeat"),
        }
    }

    fn queue(&self, payload: String) {
        if let Err(error) = self.socket.send(payload) {
            debug!(?error, "could not queue message");
        }
    }

    /// Tears down everything tied to the current connection.
    fn closed(
        &mut self,
        frame: Option<CloseFrame<'static>>,
        reconnecting: bool,
    ) -> SessionEvent<P::Event> {
        self.heartbeater = None;
        if !reconnecting {
            self.session.close();
        }
        self.session = self.session.successor();

        debug!(gateway = P::NAME, ?frame, reconnecting, "gateway connection closed");
        SessionEvent::Disconnected {
            frame,
            reconnecting,
        }
    }

    /// Drops the connection and resumes on a new one.
    fn reconnect(&mut self) -> SessionEvent<P::Event> {
        let endpoint = self
            .session
            .resume_token()
            .and_then(|token| token.resume_url)
            .map(|url| P::endpoint(&url));

        self.socket.reconnect(endpoint);
        self.closed(Some(CloseFrame::RESUME), true)
    }

    fn process(&mut self, text: &str) -> Result<Option<SessionEvent<P::Event>>, SessionError> {
        let frame = self.protocol.parse(text)?;
        match frame {
            Frame::Hello(period) => {
                let payload = match self.session.hello(period) {
                    Handshake::Identify => {
                        debug!(gateway = P::NAME, heartbeat = ?period, "identifying");
                        self.protocol.identify()?
                    }
                    Handshake::Resume(token) => {
                        debug!(
                            gateway = P::NAME,
                            heartbeat = ?period,
                            sequence = ?token.sequence,
                            "resuming"
                        );
                        self.protocol.resume(&token)?
                    }
                };
                self.queue(payload);
                self.heartbeater = Some(Heartbeater::new(period));
                Ok(None)
            }
            Frame::HeartbeatAck => {
                match self.heartbeater.as_mut().and_then(Heartbeater::acknowledged) {
                    Some(latency) => trace!(?latency, "received heartbeat ack"),
                    None => debug!("received unwanted heartbeat ack"),
                }
                Ok(None)
            }
            Frame::HeartbeatRequest => {
                self.beat();
                Ok(None)
            }
            Frame::Reconnect => {
                debug!(gateway = P::NAME, "gateway requested reconnect");
                Ok(Some(self.reconnect()))
            }
            Frame::InvalidSession { resumable } => {
                debug!(gateway = P::NAME, resumable, "session invalidated");
                if !resumable {
                    self.session.invalidate();
                }
                Ok(Some(self.reconnect()))
            }
            Frame::Dispatch { sequence, event } => {
                let resumable = self.protocol.resumable(&event);
                self.session.dispatched(sequence, resumable);

                if let Some(handlers) = P::kind(&event).and_then(|kind| self.handlers.get_mut(&kind))
                {
                    for handler in handlers {
                        handler(&event);
                    }
                }

                Ok(Some(SessionEvent::Dispatch(event)))
            }
            Frame::Malformed { sequence, reason } => {
                self.session.dispatched(sequence, None);
                Err(SessionError::deserializing(text, Some(reason.into())))
            }
        }
    }
}

impl<P: Protocol> Stream for SessionClient<P> {
    type Item = Result<SessionEvent<P::Event>, SessionError>;

    #[tracing::instrument(skip_all, name = "session.poll", fields(
        gateway = P::NAME,
        latency = ?self.heartbeater.as_ref().and_then(Heartbeater::recent),
        state = ?self.session.state(),
    ))]
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.heartbeater.as_mut().is_some_and(|h| h.poll_beat(cx)) {
                self.beat();
            }

            if self.session.state() == SessionState::Ready {
                while let Poll::Ready(Some(message)) = self.outgoing_rx.poll_recv(cx) {
                    self.queue(message);
                }
            }

            match ready!(self.socket.poll_next_unpin(cx)) {
                None => return Poll::Ready(None),
                Some(Err(source)) => {
                    return Poll::Ready(Some(Err(SessionError {
                        kind: SessionErrorType::Socket,
                        source: Some(Box::new(source)),
                    })));
                }
                Some(Ok(SocketEvent::Opened)) => {
                    self.session.opened();
                }
                Some(Ok(SocketEvent::Closed {
                    frame,
                    reconnecting,
                })) => {
                    return Poll::Ready(Some(Ok(self.closed(frame, reconnecting))));
                }
                Some(Ok(SocketEvent::Text(text))) => match self.process(&text) {
                    Ok(Some(event)) => return Poll::Ready(Some(Ok(event))),
                    Ok(None) => {}
                    Err(error) => {
                        warn!(gateway = P::NAME, ?error, "dropping gateway message");
                        return Poll::Ready(Some(Err(error)));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Minimal gateway speaking `{op, d, s, t}` where dispatches carry
    /// their type name as the event.
    #[derive(Debug)]
    struct TestGateway;

    impl Protocol for TestGateway {
        type Event = String;
        type Kind = &'static str;
        type OpCode = u8;

        const NAME: &'static str = "test";

        fn identify(&self) -> Result<String, SessionError> {
            encode(2, &"identify")
        }

        fn resume(&self, token: &ResumeToken) -> Result<String, SessionError> {
            encode(6, &(token.session_id.as_str(), token.sequence))
        }

        fn heartbeat(&self, sequence: Option<i32>) -> Result<String, SessionError> {
            encode(1, &sequence)
        }

        fn parse(&self, text: &str) -> Result<Frame<String>, SessionError> {
            let value: Value = serde_json::from_str(text)
                .map_err(|source| SessionError::deserializing(text, Some(Box::new(source))))?;
            Ok(match value["op"].as_u64() {
                Some(0) if value["d"].get("bogus").is_some() => Frame::Malformed {
                    sequence: value["s"].as_i64().map(|s| i32::try_from(s).unwrap()),
                    reason: "unknown field `bogus`".to_string(),
                },
                Some(0) => Frame::Dispatch {
                    sequence: value["s"].as_i64().map(|s| i32::try_from(s).unwrap()),
                    event: value["t"].as_str().unwrap().to_string(),
                },
                Some(7) => Frame::Reconnect,
                Some(9) => Frame::InvalidSession {
                    resumable: value["d"].as_bool().unwrap(),
                },
                Some(10) => Frame::Hello(Duration::from_millis(value["d"].as_u64().unwrap())),
                Some(11) => Frame::HeartbeatAck,
                Some(1) => Frame::HeartbeatRequest,
                _ => return Err(SessionError::deserializing(text, None)),
            })
        }

        fn kind(event: &String) -> Option<&'static str> {
            match event.as_str() {
                "READY" => Some("READY"),
                "MESSAGE_CREATE" => Some("MESSAGE_CREATE"),
                _ => None,
            }
        }

        fn resumable(&self, event: &String) -> Option<Resumable> {
            (event == "READY").then(|| Resumable {
                session_id: "abc".to_string(),
                resume_url: None,
            })
        }

        fn endpoint(host: &str) -> String {
            format!("ws://{host}")
        }

        fn can_reconnect(code: u16) -> bool {
            code != 4004
        }
    }

    fn client() -> SessionClient<TestGateway> {
        SessionClient::connect(TestGateway, "ws://127.0.0.1:9".to_string())
    }

    fn feed(client: &mut SessionClient<TestGateway>, text: &str) -> Option<SessionEvent<String>> {
        client.process(text).unwrap()
    }

    #[tokio::test]
    async fn hello_identifies_first() {
        let mut client = client();
        client.session.opened();

        assert!(feed(&mut client, r#"{"op":10,"d":45000}"#).is_none());
        assert_eq!(client.state(), SessionState::Identifying);
        assert_eq!(
            client.heartbeater().map(Heartbeater::period),
            Some(Duration::from_millis(45000))
        );
        assert_eq!(client.socket.drain_queued(), vec![r#"{"op":2,"d":"identify"}"#]);

        let event = feed(&mut client, r#"{"op":0,"s":1,"t":"READY","d":{}}"#);
        assert!(matches!(event, Some(SessionEvent::Dispatch(ref kind)) if kind == "READY"));
        assert_eq!(client.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn resumes_after_closure_with_previous_sequence() {
        let mut client = client();
        client.session.opened();
        feed(&mut client, r#"{"op":10,"d":45000}"#);
        feed(&mut client, r#"{"op":0,"s":1,"t":"READY","d":{}}"#);
        feed(&mut client, r#"{"op":0,"s":5,"t":"MESSAGE_CREATE","d":{}}"#);
        client.socket.drain_queued();

        let event = client.closed(None, true);
        assert!(matches!(
            event,
            SessionEvent::Disconnected {
                reconnecting: true,
                ..
            }
        ));
        assert!(client.heartbeater().is_none());
        assert_eq!(client.state(), SessionState::Connecting);

        client.session.opened();
        feed(&mut client, r#"{"op":10,"d":45000}"#);
        assert_eq!(client.state(), SessionState::Resuming);
        assert_eq!(
            client.socket.drain_queued(),
            vec![r#"{"op":6,"d":["abc",5]}"#]
        );
        assert_eq!(client.session().sequence(), Some(5));
    }

    #[tokio::test]
    async fn fatal_closure_closes_session() {
        let mut client = client();
        client.closed(None, false);
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn non_resumable_invalid_session_identifies_again() {
        let mut client = client();
        client.session.opened();
        feed(&mut client, r#"{"op":10,"d":45000}"#);
        feed(&mut client, r#"{"op":0,"s":3,"t":"READY","d":{}}"#);

        let event = feed(&mut client, r#"{"op":9,"d":false}"#);
        assert!(matches!(event, Some(SessionEvent::Disconnected { .. })));
        client.socket.drain_queued();

        client.session.opened();
        feed(&mut client, r#"{"op":10,"d":45000}"#);
        assert_eq!(client.socket.drain_queued(), vec![r#"{"op":2,"d":"identify"}"#]);
        assert_eq!(client.session().sequence(), None);
    }

    #[tokio::test]
    async fn dispatch_handlers_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut client = client();
        let log = Arc::clone(&seen);
        client.on_dispatch("MESSAGE_CREATE", move |event| {
            log.lock().unwrap().push(event.clone());
        });

        client.session.opened();
        feed(&mut client, r#"{"op":10,"d":45000}"#);
        feed(&mut client, r#"{"op":0,"s":1,"t":"READY","d":{}}"#);
        feed(&mut client, r#"{"op":0,"s":2,"t":"MESSAGE_CREATE","d":{}}"#);
        feed(&mut client, r#"{"op":0,"s":3,"t":"TYPING_START","d":{}}"#);
        feed(&mut client, r#"{"op":0,"s":4,"t":"MESSAGE_CREATE","d":{}}"#);

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(client.session().sequence(), Some(4));
    }

    #[tokio::test]
    async fn heartbeat_request_carries_sequence() {
        let mut client = client();
        client.session.opened();
        feed(&mut client, r#"{"op":10,"d":45000}"#);
        feed(&mut client, r#"{"op":0,"s":7,"t":"READY","d":{}}"#);
        client.socket.drain_queued();

        feed(&mut client, r#"{"op":1,"d":null}"#);
        assert_eq!(client.socket.drain_queued(), vec![r#"{"op":1,"d":7}"#]);
        assert!(client.heartbeater().is_some_and(Heartbeater::has_sent));

        feed(&mut client, r#"{"op":11}"#);
        assert!(client.heartbeater().is_some_and(|h| h.recent().is_some()));
    }

    #[tokio::test]
    async fn malformed_dispatch_still_advances_sequence() {
        let mut client = client();
        client.session.opened();
        feed(&mut client, r#"{"op":10,"d":45000}"#);
        client.socket.drain_queued();

        let error = client
            .process(r#"{"op":0,"s":9,"t":"VOICE_STATE_UPDATE","d":{"bogus":1}}"#)
            .unwrap_err();
        assert!(matches!(error.kind(), SessionErrorType::Deserializing { .. }));
        assert_eq!(client.session().sequence(), Some(9));
        assert_eq!(client.state(), SessionState::Ready);

        feed(&mut client, r#"{"op":1,"d":null}"#);
        assert_eq!(client.socket.drain_queued(), vec![r#"{"op":1,"d":9}"#]);
    }

    #[tokio::test]
    async fn malformed_frames_are_errors() {
        let mut client = client();
        let error = client.process("{not json").unwrap_err();
        assert!(matches!(error.kind(), SessionErrorType::Deserializing { .. }));
    }
}
