//! Owned context wiring the main gateway, guild state and per-guild voice
//! playback together.
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use turntable_types::gateway::DispatchEvent;
use turntable_types::gateway::incoming::{VoiceServerUpdate, VoiceState};
use turntable_types::gateway::outgoing::UpdateVoiceState;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

use crate::gateway::{MainGateway, MainSession};
use crate::guild::{GuildState, VoiceStateChange};
use crate::messenger::Messenger;
use crate::net::session::{SessionError, SessionEvent};
use crate::net::{SessionClient, TransportSocket};
use crate::options::{GatewayConfig, PlayerConfig, Token, VoiceCredentials};
use crate::player::{ConnectionInfo, Scheduler};
use crate::source::TrackResolver;
use crate::voice::{InfoPublisher, VoiceSignaling};

/// Playback scheduler of a guild, streaming over UDP.
pub type Player<R, M> = Scheduler<R, M, TransportSocket>;

/// Voice connection of one guild, from the join request to the running
/// voice session.
struct VoiceSlot<R, M> {
    /// Our own voice session id, from `VOICE_STATE_UPDATE`.
    session_id: Option<String>,
    server: Option<VoiceServerUpdate>,
    info: InfoPublisher,
    signaling: Option<JoinHandle<()>>,
    player: Player<R, M>,
}

impl<R, M> VoiceSlot<R, M> {
    fn stop_signaling(&mut self) {
        if let Some(task) = self.signaling.take() {
            task.abort();
        }
    }
}

impl<R, M> Drop for VoiceSlot<R, M> {
    fn drop(&mut self) {
        self.stop_signaling();
    }
}

/// A bot connected to the main gateway.
///
/// Everything a bot needs lives here, so several bots can run in one
/// process. [`next`](Self::next) must be polled for anything to happen:
/// it keeps the guild state current and starts voice sessions as soon as
/// both halves of their credentials have arrived.
pub struct Bot<R, M> {
    guilds: Arc<GuildState>,
    messenger: Arc<M>,
    player_config: PlayerConfig,
    resolver: Arc<R>,
    session: MainSession,
    user_id: Option<Id<UserMarker>>,
    voice: HashMap<Id<GuildMarker>, VoiceSlot<R, M>>,
}

impl<R, M> std::fmt::Debug for Bot<R, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("guilds", &self.guilds)
            .field("player_config", &self.player_config)
            .field("session", &self.session)
            .field("user_id", &self.user_id)
            .field("voice", &self.voice.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<R: TrackResolver, M: Messenger> Bot<R, M> {
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        player_config: PlayerConfig,
        resolver: Arc<R>,
        messenger: Arc<M>,
    ) -> Self {
        let endpoint = GatewayConfig::endpoint(&config.url);
        Self {
            guilds: Arc::new(GuildState::new()),
            messenger,
            player_config,
            resolver,
            session: SessionClient::connect(MainGateway::new(config), endpoint),
            user_id: None,
            voice: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn guilds(&self) -> &Arc<GuildState> {
        &self.guilds
    }

    #[must_use]
    pub const fn session(&self) -> &MainSession {
        &self.session
    }

    /// Our own user id, known once the session is ready.
    #[must_use]
    pub const fn user_id(&self) -> Option<Id<UserMarker>> {
        self.user_id
    }

    /// Waits for the next main gateway event, after applying it.
    ///
    /// Returns [`None`] once the session is closed for good.
    pub async fn next(&mut self) -> Option<Result<SessionEvent<DispatchEvent>, SessionError>> {
        let event = self.session.next().await?;
        if let Ok(SessionEvent::Dispatch(dispatch)) = &event {
            self.process(dispatch);
        }
        Some(event)
    }

    #[must_use]
    pub fn user_voice_channel(
        &self,
        guild: Id<GuildMarker>,
        user: Id<UserMarker>,
    ) -> Option<Id<ChannelMarker>> {
        self.guilds.channel_of(guild, user)
    }

    /// Asks the gateway to move us into `channel`.
    ///
    /// The voice session starts once the gateway has answered with our
    /// voice state and the voice server.
    pub fn join_voice(
        &mut self,
        guild: Id<GuildMarker>,
        channel: Id<ChannelMarker>,
    ) -> Result<(), SessionError> {
        self.slot(guild);
        debug!(%guild, %channel, "joining voice channel");
        MainGateway::update_voice_state(
            &self.session.sender(),
            &UpdateVoiceState::new(guild, Some(channel)),
        )
    }

    /// Leaves the voice channel of `guild`, dropping its queue.
    pub fn leave_voice(&mut self, guild: Id<GuildMarker>) -> Result<(), SessionError> {
        if let Some(slot) = self.voice.remove(&guild) {
            slot.player.stop();
        }

        debug!(%guild, "leaving voice channel");
        MainGateway::update_voice_state(&self.session.sender(), &UpdateVoiceState::new(guild, None))
    }

    /// Gets the player of `guild`, creating it if needed.
    pub fn player(&mut self, guild: Id<GuildMarker>) -> Player<R, M> {
        self.slot(guild).player.clone()
    }

    /// Connection info of the voice session of `guild`.
    #[must_use]
    pub fn voice_info(&self, guild: Id<GuildMarker>) -> Option<ConnectionInfo> {
        self.voice.get(&guild).map(|slot| slot.info.subscribe())
    }

    /// Checks whether a voice session of `guild` is running.
    #[must_use]
    pub fn is_voice_running(&self, guild: Id<GuildMarker>) -> bool {
        self.voice
            .get(&guild)
            .and_then(|slot| slot.signaling.as_ref())
            .is_some_and(|task| !task.is_finished())
    }

    /// Reacts to a message. Failures are logged only.
    pub async fn acknowledge(
        &self,
        channel: Id<ChannelMarker>,
        message: Id<MessageMarker>,
        emoji: &str,
    ) {
        if let Err(error) = self.messenger.add_reaction(channel, message, emoji).await {
            warn!(?error, %channel, %message, "could not add reaction");
        }
    }

    /// Voice credentials of `guild`, if both halves have arrived.
    #[must_use]
    pub fn credentials(&self, guild: Id<GuildMarker>) -> Option<VoiceCredentials> {
        let slot = self.voice.get(&guild)?;
        let server = slot.server.as_ref()?;
        Some(VoiceCredentials {
            endpoint: server.endpoint.clone()?,
            guild_id: guild,
            user_id: self.user_id?,
            session_id: slot.session_id.clone()?,
            token: Token::from(server.token.as_str()),
        })
    }

    fn process(&mut self, event: &DispatchEvent) {
        match event {
            DispatchEvent::Ready(ready) => {
                debug!(user = %ready.user.id, "session is ready");
                self.user_id = Some(ready.user.id);
            }
            DispatchEvent::GuildCreate(guild) => {
                self.guilds.replace(guild.id, &guild.voice_states);
            }
            DispatchEvent::VoiceStateUpdate(state) => self.voice_state(state),
            DispatchEvent::VoiceServerUpdate(update) => self.voice_server(update),
            _ => {}
        }
    }

    fn voice_state(&mut self, state: &VoiceState) {
        let change = self.guilds.apply(state);
        let Some(guild) = state.guild_id else {
            return;
        };
        if Some(state.user_id) != self.user_id {
            return;
        }

        if let VoiceStateChange::Left(channel) = change {
            debug!(%guild, %channel, "disconnected from voice");
            if let Some(slot) = self.voice.get_mut(&guild) {
                slot.stop_signaling();
                slot.session_id = None;
                slot.server = None;
            }
            return;
        }
        if state.channel_id.is_none() {
            return;
        }

        let slot = self.slot(guild);
        if slot.session_id.as_deref() == Some(state.session_id.as_str()) {
            return;
        }
        slot.session_id = Some(state.session_id.clone());
        self.start_voice(guild);
    }

    fn voice_server(&mut self, update: &VoiceServerUpdate) {
        let guild = update.guild_id;
        self.slot(guild).server = Some(update.clone());

        if update.endpoint.is_none() {
            debug!(%guild, "voice server is unavailable, waiting for a new one");
            if let Some(slot) = self.voice.get_mut(&guild) {
                slot.stop_signaling();
            }
            return;
        }
        self.start_voice(guild);
    }

    /// (Re)starts the voice session of `guild` with fresh credentials.
    fn start_voice(&mut self, guild: Id<GuildMarker>) {
        let Some(credentials) = self.credentials(guild) else {
            trace!(%guild, "voice credentials are incomplete");
            return;
        };
        let Some(slot) = self.voice.get_mut(&guild) else {
            return;
        };

        slot.stop_signaling();
        debug!(%guild, endpoint = %credentials.endpoint, "starting voice session");
        let signaling = VoiceSignaling::with_publisher(credentials, Arc::clone(&slot.info));
        slot.signaling = Some(tokio::spawn(signaling.run()));
    }

    fn slot(&mut self, guild: Id<GuildMarker>) -> &mut VoiceSlot<R, M> {
        self.voice.entry(guild).or_insert_with(|| {
            let (info, rx) = watch::channel(None);
            VoiceSlot {
                session_id: None,
                server: None,
                info: Arc::new(info),
                signaling: None,
                player: Scheduler::new(
                    self.player_config,
                    Arc::clone(&self.resolver),
                    Arc::clone(&self.messenger),
                    TransportSocket::new(),
                    rx,
                ),
            }
        })
    }
}
