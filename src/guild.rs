//! Per-guild voice channel occupancy.
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::trace;
use turntable_types::gateway::incoming::VoiceState;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};

type Occupancy = HashMap<Id<UserMarker>, Id<ChannelMarker>>;

/// Outcome of applying a voice state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStateChange {
    Joined(Id<ChannelMarker>),
    Moved {
        from: Id<ChannelMarker>,
        to: Id<ChannelMarker>,
    },
    Left(Id<ChannelMarker>),
    Unchanged,
}

/// Which channel each user occupies, by guild.
///
/// A user has at most one entry per guild. Writes come from the task
/// processing the main gateway, any task may read.
#[derive(Debug, Default)]
pub struct GuildState {
    guilds: DashMap<Id<GuildMarker>, Occupancy>,
}

impl GuildState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the occupancy of `guild` with a full snapshot.
    pub fn replace(&self, guild: Id<GuildMarker>, states: &[VoiceState]) {
        let occupancy = states
            .iter()
            .filter_map(|state| state.channel_id.map(|channel| (state.user_id, channel)))
            .collect::<Occupancy>();

        trace!(%guild, users = occupancy.len(), "replacing voice occupancy");
        self.guilds.insert(guild, occupancy);
    }

    /// Applies an incremental update. Updates without a guild are ignored.
    pub fn apply(&self, state: &VoiceState) -> VoiceStateChange {
        let Some(guild) = state.guild_id else {
            return VoiceStateChange::Unchanged;
        };

        let mut occupancy = self.guilds.entry(guild).or_default();
        let change = match state.channel_id {
            Some(channel) => match occupancy.insert(state.user_id, channel) {
                None => VoiceStateChange::Joined(channel),
                Some(previous) if previous == channel => VoiceStateChange::Unchanged,
                Some(previous) => VoiceStateChange::Moved {
                    from: previous,
                    to: channel,
                },
            },
            None => occupancy
                .remove(&state.user_id)
                .map_or(VoiceStateChange::Unchanged, VoiceStateChange::Left),
        };

        trace!(%guild, user = %state.user_id, ?change, "applied voice state");
        change
    }

    #[must_use]
    pub fn channel_of(&self, guild: Id<GuildMarker>, user: Id<UserMarker>) -> Option<Id<ChannelMarker>> {
        self.guilds
            .get(&guild)
            .and_then(|occupancy| occupancy.get(&user).copied())
    }

    /// Users in `channel`, in no particular order.
    #[must_use]
    pub fn occupants(&self, guild: Id<GuildMarker>, channel: Id<ChannelMarker>) -> Vec<Id<UserMarker>> {
        self.guilds
            .get(&guild)
            .map(|occupancy| {
                occupancy
                    .iter()
                    .filter(|(_, occupied)| **occupied == channel)
                    .map(|(user, _)| *user)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove(&self, guild: Id<GuildMarker>) {
        self.guilds.remove(&guild);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GUILD: Id<GuildMarker> = Id::new(1);
    const C1: Id<ChannelMarker> = Id::new(10);
    const C2: Id<ChannelMarker> = Id::new(20);
    const U: Id<UserMarker> = Id::new(100);
    const V: Id<UserMarker> = Id::new(200);

    fn update(user: Id<UserMarker>, channel: Option<Id<ChannelMarker>>) -> VoiceState {
        VoiceState {
            guild_id: Some(GUILD),
            channel_id: channel,
            user_id: user,
            session_id: "s".to_string(),
        }
    }

    #[test]
    fn moving_replaces_only_that_user() {
        let state = GuildState::new();
        state.replace(GUILD, &[update(U, Some(C1)), update(V, Some(C1))]);

        assert_eq!(
            state.apply(&update(U, Some(C2))),
            VoiceStateChange::Moved { from: C1, to: C2 }
        );
        assert_eq!(state.channel_of(GUILD, U), Some(C2));
        assert_eq!(state.channel_of(GUILD, V), Some(C1));
        assert_eq!(state.occupants(GUILD, C2), vec![U]);
        assert_eq!(state.occupants(GUILD, C1), vec![V]);
    }

    #[test]
    fn leaving_removes_entry() {
        let state = GuildState::new();
        assert_eq!(state.apply(&update(U, Some(C1))), VoiceStateChange::Joined(C1));
        assert_eq!(state.apply(&update(U, Some(C1))), VoiceStateChange::Unchanged);
        assert_eq!(state.apply(&update(U, None)), VoiceStateChange::Left(C1));
        assert_eq!(state.apply(&update(U, None)), VoiceStateChange::Unchanged);
        assert_eq!(state.channel_of(GUILD, U), None);
    }

    #[test]
    fn snapshot_replaces_everything() {
        let state = GuildState::new();
        state.apply(&update(U, Some(C1)));

        let mut snapshot = update(V, Some(C2));
        snapshot.guild_id = None;
        state.replace(GUILD, &[snapshot, update(U, None)]);

        assert_eq!(state.channel_of(GUILD, U), None);
        assert_eq!(state.channel_of(GUILD, V), Some(C2));
    }

    #[test]
    fn updates_without_guild_are_ignored() {
        let state = GuildState::new();
        let mut orphan = update(U, Some(C1));
        orphan.guild_id = None;
        assert_eq!(state.apply(&orphan), VoiceStateChange::Unchanged);
        assert_eq!(state.channel_of(GUILD, U), None);
    }
}
