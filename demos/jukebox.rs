//! Joins a voice channel and plays local audio files.
//!
//! ```text
//! TOKEN=... GUILD_ID=... CHANNEL_ID=... TEXT_CHANNEL_ID=... \
//!     cargo run --example jukebox -- intro.ogg song.mp3
//! ```
//!
//! Send `!skip`, `!stop` or `!np` in the guild to control playback.
use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};
use turntable::Bot;
use turntable::messenger::{Messenger, MessengerError};
use turntable::net::SessionEvent;
use turntable::options::{GatewayConfig, PlayerConfig, Token};
use turntable::source::{
    ResolveError, ResolveErrorType, ResolvedTrack, TrackId, TrackMetadata, TrackResolver,
};
use turntable_types::gateway::DispatchEvent;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker};

/// Resolves track ids as paths on the local file system.
struct Files;

#[async_trait::async_trait]
impl TrackResolver for Files {
    async fn resolve(&self, track: &TrackId) -> Result<ResolvedTrack, ResolveError> {
        let path = Path::new(track.as_str());
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| ResolveError::with_source(ResolveErrorType::NotFound, source))?;

        let title = path.file_stem().map_or_else(
            || track.to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        );
        Ok(ResolvedTrack {
            metadata: TrackMetadata {
                title,
                duration: Duration::ZERO,
                owner: "local files".to_string(),
            },
            data,
        })
    }
}

/// Prints messages instead of posting them.
#[derive(Default)]
struct Console {
    last_id: AtomicU64,
}

#[async_trait::async_trait]
impl Messenger for Console {
    async fn send_message(
        &self,
        channel: Id<ChannelMarker>,
        content: &str,
    ) -> Result<Id<MessageMarker>, MessengerError> {
        let id = self.last_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(%channel, id, "{content}");
        Ok(Id::new(id))
    }

    async fn edit_message(
        &self,
        channel: Id<ChannelMarker>,
        message: Id<MessageMarker>,
        content: &str,
    ) -> Result<(), MessengerError> {
        info!(%channel, %message, "(edited) {content}");
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel: Id<ChannelMarker>,
        message: Id<MessageMarker>,
        emoji: &str,
    ) -> Result<(), MessengerError> {
        info!(%channel, %message, emoji, "reacted");
        Ok(())
    }
}

fn parse_id_from_env<T>(env: &'static str) -> Result<Id<T>> {
    let content = dotenvy::var(env).with_context(|| format!("missing `{env}` environment variable"))?;
    Id::<T>::from_str(&content)
        .with_context(|| format!("could not parse Discord snowflake of {env:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv().ok();

    let fmt = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(fmt))?;

    let token = dotenvy::var("TOKEN").context("missing `TOKEN` environment variable")?;
    let guild = parse_id_from_env::<GuildMarker>("GUILD_ID")?;
    let channel = parse_id_from_env::<ChannelMarker>("CHANNEL_ID")?;
    let announce = parse_id_from_env::<ChannelMarker>("TEXT_CHANNEL_ID")?;

    let mut bot = Bot::new(
        GatewayConfig::new(Token::from(token.as_str())),
        PlayerConfig::default(),
        Arc::new(Files),
        Arc::new(Console::default()),
    );

    let player = bot.player(guild);
    for path in std::env::args().skip(1) {
        player.enqueue(TrackId::new(path));
    }

    while let Some(event) = bot.next().await {
        let event = match event {
            Ok(event) => event,
            Err(error) => {
                warn!(?error, "gateway error");
                continue;
            }
        };

        match event {
            SessionEvent::Dispatch(DispatchEvent::GuildCreate(created)) if created.id == guild => {
                bot.join_voice(guild, channel)?;

                let player = bot.player(guild);
                tokio::spawn(async move {
                    if let Err(error) = player.play(announce).await {
                        warn!(?error, "playback ended");
                    }
                });
            }
            SessionEvent::Dispatch(DispatchEvent::MessageCreate(message))
                if message.guild_id == Some(guild) =>
            {
                let player = bot.player(guild);
                let handled = match message.content.trim() {
                    "!skip" => player.skip(),
                    "!stop" => {
                        player.stop();
                        true
                    }
                    "!np" => {
                        let progress = player.progress();
                        info!(metadata = ?progress.metadata, elapsed = ?progress.elapsed, "progress");
                        true
                    }
                    _ => false,
                };

                if handled {
                    bot.acknowledge(message.channel_id, message.id, "👌").await;
                }
            }
            SessionEvent::Disconnected {
                reconnecting: false,
                ..
            } => break,
            _ => {}
        }
    }

    Ok(())
}
