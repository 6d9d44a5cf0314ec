use std::str::FromStr;
use tracing::{debug, warn};
use turntable_types::voice::Event;
use turntable_types::voice::incoming::Ready;
use turntable_types::voice::outgoing::{SelectProtocol, SetSpeaking};

use super::VoiceConnectionInfo;
use crate::crypto::EncryptMode;

/// What the voice handshake asks for after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    SelectProtocol(SelectProtocol),
    SetSpeaking(SetSpeaking),
    /// The session key arrived, packets may be sent.
    Connected(VoiceConnectionInfo),
}

/// Voice handshake steps between `Ready` and the session description.
///
/// Holds no connection of its own, it only decides what to answer.
#[derive(Debug, Clone)]
pub struct VoiceHandshake {
    mode: EncryptMode,
    ready: Option<Ready>,
}

impl VoiceHandshake {
    #[must_use]
    pub const fn new(mode: EncryptMode) -> Self {
        Self { mode, ready: None }
    }

    #[must_use]
    pub const fn mode(&self) -> EncryptMode {
        self.mode
    }

    pub fn process(&mut self, event: &Event) -> Vec<HandshakeAction> {
        match event {
            Event::Ready(ready) => {
                debug!(ssrc = ready.ssrc, ip = ?ready.ip, port = ready.port, "voice server ready");
                if !ready.modes.is_empty()
                    && !ready.modes.iter().any(|mode| mode == self.mode.to_request_str())
                {
                    warn!(modes = ?ready.modes, preferred = ?self.mode, "voice server does not list preferred mode");
                }

                self.ready = Some(ready.clone());
                self.select(ready)
            }
            Event::Resumed => {
                // The server keeps the key to itself after a resume, asking
                // for the protocol again makes it describe the session anew.
                let Some(ready) = self.ready.as_ref() else {
                    warn!("voice session resumed before it was ever ready");
                    return Vec::new();
                };
                debug!("voice session resumed, selecting protocol again");
                self.select(ready)
            }
            Event::SessionDescription(description) => {
                let Some(ready) = self.ready.as_ref() else {
                    warn!("received session description before ready");
                    return Vec::new();
                };

                let mode = match EncryptMode::from_str(&description.mode) {
                    Ok(mode) => mode,
                    Err(error) => {
                        warn!(?error, "voice server picked an unsupported mode");
                        return Vec::new();
                    }
                };

                vec![HandshakeAction::Connected(VoiceConnectionInfo {
                    host: ready.ip,
                    port: ready.port,
                    ssrc: description.ssrc().unwrap_or(ready.ssrc),
                    secret_key: description.secret_key,
                    mode,
                })]
            }
            _ => Vec::new(),
        }
    }

    fn select(&self, ready: &Ready) -> Vec<HandshakeAction> {
        vec![
            HandshakeAction::SelectProtocol(SelectProtocol::udp(
                ready.ip,
                ready.port,
                self.mode.to_request_str(),
            )),
            HandshakeAction::SetSpeaking(SetSpeaking::microphone(ready.ssrc)),
        ]
    }
}

impl Default for VoiceHandshake {
    fn default() -> Self {
        Self::new(EncryptMode::XSalsa20Poly1305Lite)
    }
}
