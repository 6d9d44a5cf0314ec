use std::sync::Arc;
use tracing::warn;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};

use crate::messenger::Messenger;
use crate::source::{TrackId, TrackMetadata};

/// How playback of a track ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEnd {
    Finished,
    Skipped,
    Stopped,
    /// Decoding, encoding or sealing a frame failed.
    Failed,
}

/// Posts track announcements to a text channel.
pub(super) struct Announcer<M> {
    messenger: Arc<M>,
    channel: Id<ChannelMarker>,
}

impl<M: Messenger> Announcer<M> {
    pub(super) const fn new(messenger: Arc<M>, channel: Id<ChannelMarker>) -> Self {
        Self { messenger, channel }
    }

    pub(super) async fn now_playing(&self, metadata: &TrackMetadata) -> Option<Id<MessageMarker>> {
        let content = format!("Now playing: {} by {}", metadata.title, metadata.owner);
        match self.messenger.send_message(self.channel, &content).await {
            Ok(message) => Some(message),
            Err(error) => {
                warn!(?error, channel = %self.channel, "could not announce track");
                None
            }
        }
    }

    pub(super) async fn ended(
        &self,
        message: Option<Id<MessageMarker>>,
        metadata: &TrackMetadata,
        end: TrackEnd,
    ) {
        let Some(message) = message else {
            return;
        };

        let content = ended_message(metadata, end);
        if let Err(error) = self
            .messenger
            .edit_message(self.channel, message, &content)
            .await
        {
            warn!(?error, channel = %self.channel, "could not update announcement");
        }
    }

    pub(super) async fn unavailable(&self, track: &TrackId) {
        let content = format!("Could not load track {track}, skipping");
        if let Err(error) = self.messenger.send_message(self.channel, &content).await {
            warn!(?error, channel = %self.channel, "could not post notice");
        }
    }
}

fn ended_message(metadata: &TrackMetadata, end: TrackEnd) -> String {
    let prefix = match end {
        TrackEnd::Finished => "Played",
        TrackEnd::Skipped => "Skipped",
        TrackEnd::Stopped => "Stopped",
        TrackEnd::Failed => "Could not finish",
    };
    format!("{prefix}: {} by {}", metadata.title, metadata.owner)
}
