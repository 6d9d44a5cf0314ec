#![forbid(unsafe_code)]
#![warn(
    clippy::pedantic,
    clippy::must_use_candidate,
    clippy::empty_enum,
    clippy::unwrap_used
)]
#![allow(
    clippy::new_without_default,
    clippy::empty_docs,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

pub mod audio;
pub mod bot;
pub mod crypto;
pub mod gateway;
pub mod guild;
pub mod messenger;
pub mod options;
pub mod packet;
pub mod player;
pub mod source;
pub mod voice;

/// This module provides the connection building blocks shared by both
/// gateways and the voice transport.
///
/// A [`Protocol`](net::Protocol) describes one gateway, the session
/// client runs any of them over a reconnecting websocket.
pub mod net;

pub use self::bot::Bot;
