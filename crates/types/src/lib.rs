#![forbid(unsafe_code)]
#![warn(
    clippy::pedantic,
    clippy::must_use_candidate,
    clippy::empty_enum,
    clippy::unwrap_used
)]
#![allow(
    clippy::new_without_default,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

mod deserializers;

pub mod close_code;
pub mod gateway;
pub mod voice;

pub use self::close_code::{CloseCodeConversionError, GatewayCloseCode, VoiceCloseCode};

/// Discord gateway API version that Turntable currently supports.
pub const GATEWAY_API_VERSION: u8 = 10;

/// Discord voice gateway API version that Turntable currently supports.
pub const VOICE_API_VERSION: u8 = 4;

/// Length of the secret key handed out by the voice gateway.
pub const RTP_KEY_LEN: usize = 32;
