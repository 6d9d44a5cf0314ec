use futures::{Stream, StreamExt, ready};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tracing::{debug, warn};
use turntable_types::voice::{Event, OpCode};
use twilight_model::gateway::CloseFrame;

use super::{HandshakeAction, VoiceConnectionInfo, VoiceGateway, VoiceHandshake};
use crate::net::session::{SessionClient, SessionError, SessionEvent, SessionState};
use crate::net::Protocol;
use crate::options::VoiceCredentials;

/// Events emitted by [`VoiceSignaling`].
#[derive(Debug)]
pub enum VoiceEvent {
    /// Any other voice gateway event, such as users speaking.
    Gateway(Event),
    /// A session key has been issued and published.
    Connected(Arc<VoiceConnectionInfo>),
    /// The published connection info has been withdrawn.
    Disconnected {
        frame: Option<CloseFrame<'static>>,
        reconnecting: bool,
    },
}

/// Publishing end of a guild's voice connection info.
pub type InfoPublisher = Arc<watch::Sender<Option<Arc<VoiceConnectionInfo>>>>;

/// Voice gateway session of one guild.
///
/// The connection info is published through a [`watch`] channel as soon as
/// the session key is known, and withdrawn whenever the connection drops
/// until a new key arrives. Dropping the session withdraws it too.
#[derive(Debug)]
pub struct VoiceSignaling {
    handshake: VoiceHandshake,
    info: InfoPublisher,
    published: Option<Arc<VoiceConnectionInfo>>,
    session: SessionClient<VoiceGateway>,
}

impl VoiceSignaling {
    #[must_use]
    pub fn new(credentials: VoiceCredentials) -> Self {
        let (info, _) = watch::channel(None);
        Self::with_publisher(credentials, Arc::new(info))
    }

    /// Publishes into an existing channel, so that its receivers survive
    /// the replacement of one voice session by another.
    ///
    /// Only info published by this session is ever withdrawn by it.
    #[must_use]
    pub fn with_publisher(credentials: VoiceCredentials, info: InfoPublisher) -> Self {
        let endpoint = VoiceGateway::endpoint(&credentials.endpoint);
        Self {
            handshake: VoiceHandshake::default(),
            info,
            published: None,
            session: SessionClient::connect(VoiceGateway::new(credentials), endpoint),
        }
    }

    /// Subscribes to the connection info of this voice session.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<VoiceConnectionInfo>>> {
        self.info.subscribe()
    }

    /// Currently published connection info.
    #[must_use]
    pub fn info(&self) -> Option<Arc<VoiceConnectionInfo>> {
        self.info.borrow().clone()
    }

    #[must_use]
    pub const fn session(&self) -> &SessionClient<VoiceGateway> {
        &self.session
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Closes the voice connection and withdraws the connection info.
    pub fn close(&mut self, frame: CloseFrame<'static>) {
        self.withdraw();
        self.session.close(frame);
    }

    /// Drives the session until it closes for good.
    pub async fn run(mut self) {
        while let Some(event) = self.next().await {
            match event {
                Ok(VoiceEvent::Connected(info)) => {
                    debug!(ssrc = info.ssrc, addr = %info.addr(), "voice connection established");
                }
                Ok(_) => {}
                Err(error) => debug!(?error, "voice gateway error"),
            }
        }
        self.withdraw();
        debug!("voice signaling ended");
    }

    fn withdraw(&mut self) {
        let Some(published) = self.published.take() else {
            return;
        };

        self.info.send_if_modified(|info| {
            let ours = info
                .as_ref()
                .is_some_and(|info| Arc::ptr_eq(info, &published));
            if ours {
                *info = None;
            }
            ours
        });
    }

    fn process(&mut self, event: Event) -> VoiceEvent {
        let mut connected = None;
        for action in self.handshake.process(&event) {
            let result = match action {
                HandshakeAction::SelectProtocol(payload) => {
                    self.session.send(OpCode::SelectProtocol, &payload)
                }
                HandshakeAction::SetSpeaking(payload) => {
                    self.session.send(OpCode::Speaking, &payload)
                }
                HandshakeAction::Connected(info) => {
                    let info = Arc::new(info);
                    self.info.send_replace(Some(Arc::clone(&info)));
                    self.published = Some(Arc::clone(&info));
                    connected = Some(info);
                    Ok(())
                }
            };

            if let Err(error) = result {
                warn!(?error, "could not queue voice handshake payload");
            }
        }

        match connected {
            Some(info) => VoiceEvent::Connected(info),
            None => VoiceEvent::Gateway(event),
        }
    }
}

impl Drop for VoiceSignaling {
    fn drop(&mut self) {
        self.withdraw();
    }
}

impl Stream for VoiceSignaling {
    type Item = Result<VoiceEvent, SessionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let event = match ready!(self.session.poll_next_unpin(cx)) {
            None => {
                self.withdraw();
                return Poll::Ready(None);
            }
            Some(Err(error)) => return Poll::Ready(Some(Err(error))),
            Some(Ok(event)) => event,
        };

        Poll::Ready(Some(Ok(match event {
            SessionEvent::Dispatch(event) => self.process(event),
            SessionEvent::Disconnected {
                frame,
                reconnecting,
            } => {
                self.withdraw();
                VoiceEvent::Disconnected {
                    frame,
                    reconnecting,
                }
            }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::tests::credentials;
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr};
    use turntable_types::voice::incoming::{Ready, SessionDescription};

    fn connected(signaling: &mut VoiceSignaling) -> Arc<VoiceConnectionInfo> {
        signaling.process(Event::Ready(Ready {
            ssrc: 7,
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 50004,
            modes: Vec::new(),
        }));
        let event = signaling.process(Event::SessionDescription(SessionDescription {
            mode: "xsalsa20_poly1305_lite".to_string(),
            secret_key: [1; 32],
            encodings: Vec::new(),
        }));
        let VoiceEvent::Connected(info) = event else {
            panic!("expected connection info");
        };
        info
    }

    #[tokio::test]
    async fn publishes_and_withdraws_info() {
        let mut signaling = VoiceSignaling::new(credentials());
        let mut rx = signaling.subscribe();
        assert!(rx.borrow_and_update().is_none());

        let info = connected(&mut signaling);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_deref(), Some(&*info));
        assert_eq!(info.ssrc, 7);

        signaling.withdraw();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());

        // Nothing to withdraw, receivers are not woken again.
        signaling.withdraw();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn new_key_is_a_new_info() {
        let mut signaling = VoiceSignaling::new(credentials());
        let first = connected(&mut signaling);
        let second = connected(&mut signaling);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&signaling.info().unwrap(), &second));
    }

    #[tokio::test]
    async fn shared_publisher_keeps_newer_info() {
        let (tx, mut rx) = watch::channel(None);
        let publisher = Arc::new(tx);

        let mut old = VoiceSignaling::with_publisher(credentials(), Arc::clone(&publisher));
        connected(&mut old);
        let mut new = VoiceSignaling::with_publisher(credentials(), Arc::clone(&publisher));
        let info = connected(&mut new);

        // The replaced session must not withdraw what its successor published.
        drop(old);
        assert!(Arc::ptr_eq(rx.borrow_and_update().as_ref().unwrap(), &info));

        drop(new);
        assert!(rx.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn close_ends_session() {
        let mut signaling = VoiceSignaling::new(credentials());
        connected(&mut signaling);
        signaling.close(CloseFrame::NORMAL);
        assert!(signaling.info().is_none());
        assert_eq!(signaling.state(), SessionState::Closed);
    }
}
