//! Configuration handed to the gateways and the player.
use std::time::Duration;
use turntable_types::GATEWAY_API_VERSION;
use turntable_types::gateway::outgoing::IdentifyProperties;
use twilight_model::gateway::Intents;
use twilight_model::id::Id;
use twilight_model::id::marker::{GuildMarker, UserMarker};

/// Wrapper for an authorization token with a debug implementation
/// that redacts the string.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Token {
    /// Authorization token that is redacted in the Debug implementation.
    inner: Box<str>,
}

impl Token {
    /// Create a new authorization wrapper.
    #[must_use]
    pub const fn new(token: Box<str>) -> Self {
        Self { inner: token }
    }

    /// Exposes the authorization token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value.into())
    }
}

/// Parameters of the main gateway session.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub token: Token,
    pub intents: Intents,
    /// Host (and optional path) of the gateway, without scheme or query.
    pub url: String,
    pub properties: IdentifyProperties,
}

impl GatewayConfig {
    /// Default gateway host.
    pub const DEFAULT_URL: &str = "gateway.discord.gg";

    /// Intents needed to follow voice occupancy and text commands.
    pub const DEFAULT_INTENTS: Intents = Intents::GUILDS
        .union(Intents::GUILD_VOICE_STATES)
        .union(Intents::GUILD_MESSAGES)
        .union(Intents::GUILD_MESSAGE_REACTIONS)
        .union(Intents::MESSAGE_CONTENT);

    #[must_use]
    pub fn new(token: Token) -> Self {
        Self {
            token,
            intents: Self::DEFAULT_INTENTS,
            url: Self::DEFAULT_URL.to_string(),
            properties: IdentifyProperties::new(env!("CARGO_PKG_NAME")),
        }
    }

    /// Full websocket URL of `host`, pinned to the supported API version.
    #[must_use]
    pub fn endpoint(host: &str) -> String {
        let host = host
            .trim_start_matches("wss://")
            .trim_start_matches("ws://")
            .trim_end_matches('/');
        format!("wss://{host}/?v={GATEWAY_API_VERSION}&encoding=json")
    }
}

/// Everything the voice gateway needs to identify, assembled from the
/// bot's own `VOICE_STATE_UPDATE` and the guild's `VOICE_SERVER_UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceCredentials {
    pub endpoint: String,
    pub guild_id: Id<GuildMarker>,
    pub user_id: Id<UserMarker>,
    pub session_id: String,
    pub token: Token,
}

/// PCM layout produced by the decode stage and consumed by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    pub sample_rate: u32,
    pub channels: usize,
    /// Samples per channel in one frame.
    pub frame_size: usize,
    /// Encoded frames buffered ahead of the playback tick.
    pub frame_buffer: usize,
}

impl PlayerConfig {
    /// Playback time covered by one frame.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs(self.frame_size as u64) / self.sample_rate
    }

    /// Interleaved samples in one full frame.
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        self.frame_size * self.channels
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            frame_size: 960,
            frame_buffer: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_redacted() {
        let token = Token::from("very secret");
        assert_eq!(format!("{token:?}"), "<redacted>");
        assert_eq!(token.expose(), "very secret");
    }

    #[test]
    fn default_frame_is_twenty_millis() {
        let config = PlayerConfig::default();
        assert_eq!(config.frame_duration(), Duration::from_millis(20));
        assert_eq!(config.frame_len(), 1920);
    }

    #[test]
    fn endpoint_strips_scheme() {
        assert_eq!(
            GatewayConfig::endpoint("wss://gateway-us-east1-b.discord.gg/"),
            "wss://gateway-us-east1-b.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(
            GatewayConfig::endpoint(GatewayConfig::DEFAULT_URL),
            "wss://gateway.discord.gg/?v=10&encoding=json"
        );
    }

    #[test]
    fn default_intents_cover_voice_states() {
        let config = GatewayConfig::new(Token::from("t"));
        assert!(config.intents.contains(Intents::GUILD_VOICE_STATES));
        assert!(config.intents.contains(Intents::MESSAGE_CONTENT));
    }
}
