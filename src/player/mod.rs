//! Track queue and the real-time playback loop of one voice connection.
//!
//! A [`Scheduler`] pops tracks in FIFO order, resolves them and streams
//! their encoded frames at the frame cadence. Frames are produced on a
//! blocking thread and handed over through a bounded channel, so a skip
//! only has to drop the receiving end to release the decoder.
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, trace, warn};
use twilight_model::id::Id;
use twilight_model::id::marker::ChannelMarker;

use crate::audio::{AudioError, AudioPipeline, EncodedFrame};
use crate::messenger::Messenger;
use crate::net::Transport;
use crate::options::PlayerConfig;
use crate::packet::{PacketCodec, PacketCounters};
use crate::source::{TrackId, TrackMetadata, TrackResolver};
use crate::voice::VoiceConnectionInfo;

mod announce;
mod error;

use self::announce::Announcer;

pub use self::announce::TrackEnd;
pub use self::error::{PlaybackError, PlaybackErrorType};

/// Receiving end of the connection info published by the voice session.
pub type ConnectionInfo = watch::Receiver<Option<Arc<VoiceConnectionInfo>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    Idle,
    /// Waiting for the voice session to publish its connection info.
    AwaitingTransport,
    Playing,
    /// The queue was cleared by [`Scheduler::stop`].
    Stopped,
}

/// Snapshot of the scheduler, see [`Scheduler::progress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub state: PlayerState,
    pub playing: bool,
    pub track: Option<TrackId>,
    pub metadata: Option<TrackMetadata>,
    /// Samples per channel of the current track sent so far.
    pub elapsed_samples: u64,
    pub elapsed: Duration,
    pub queued: usize,
}

#[derive(Debug)]
struct Player {
    state: PlayerState,
    queue: VecDeque<TrackId>,
    current: Option<(TrackId, TrackMetadata)>,
    elapsed: u64,
    running: bool,
    skip: bool,
    stop: bool,
}

struct Shared<R, M, T> {
    config: PlayerConfig,
    resolver: Arc<R>,
    messenger: Arc<M>,
    info: ConnectionInfo,
    player: Mutex<Player>,
    transport: Mutex<Option<T>>,
    /// Wakes a loop waiting for connection info on skip or stop.
    wake: Notify,
}

/// Playback scheduler of one voice connection.
///
/// Cloning is cheap, clones control the same queue. The scheduler is the
/// sole owner of the packet counters, which are only advanced by its tick.
pub struct Scheduler<R, M, T> {
    shared: Arc<Shared<R, M, T>>,
}

impl<R, M, T> Clone for Scheduler<R, M, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R, M, T> std::fmt::Debug for Scheduler<R, M, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.shared.config)
            .field("player", &*self.shared.player.lock())
            .finish_non_exhaustive()
    }
}

impl<R: TrackResolver, M: Messenger, T: Transport> Scheduler<R, M, T> {
    #[must_use]
    pub fn new(
        config: PlayerConfig,
        resolver: Arc<R>,
        messenger: Arc<M>,
        transport: T,
        info: ConnectionInfo,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                resolver,
                messenger,
                info,
                player: Mutex::new(Player {
                    state: PlayerState::Idle,
                    queue: VecDeque::new(),
                    current: None,
                    elapsed: 0,
                    running: false,
                    skip: false,
                    stop: false,
                }),
                transport: Mutex::new(Some(transport)),
                wake: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn state(&self) -> PlayerState {
        self.shared.player.lock().state
    }

    /// Tracks waiting to be played, next one first.
    #[must_use]
    pub fn queue(&self) -> Vec<TrackId> {
        self.shared.player.lock().queue.iter().cloned().collect()
    }

    /// Appends a track to the queue and returns its position.
    pub fn enqueue(&self, track: TrackId) -> usize {
        let mut player = self.shared.player.lock();
        debug!(%track, position = player.queue.len(), "track enqueued");
        player.queue.push_back(track);
        player.queue.len() - 1
    }

    /// Abandons the current track within one tick.
    ///
    /// Returns `false` if there is no track to skip.
    pub fn skip(&self) -> bool {
        let mut player = self.shared.player.lock();
        if player.current.is_none() {
            return false;
        }
        player.skip = true;
        drop(player);

        self.shared.wake.notify_one();
        true
    }

    /// Clears the queue and abandons the current track within one tick.
    pub fn stop(&self) {
        let mut player = self.shared.player.lock();
        player.queue.clear();
        if player.running {
            player.stop = true;
            drop(player);
            self.shared.wake.notify_one();
        } else {
            player.state = PlayerState::Stopped;
        }
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        let player = self.shared.player.lock();
        let sample_rate = u64::from(self.shared.config.sample_rate.max(1));
        Progress {
            state: player.state,
            playing: player.state == PlayerState::Playing && player.current.is_some(),
            track: player.current.as_ref().map(|(track, _)| track.clone()),
            metadata: player.current.as_ref().map(|(_, metadata)| metadata.clone()),
            elapsed_samples: player.elapsed,
            elapsed: Duration::from_micros(player.elapsed * 1_000_000 / sample_rate),
            queued: player.queue.len(),
        }
    }

    /// Plays the queue until it runs empty or [`stop`](Self::stop) is
    /// called, announcing each track in `announce`.
    ///
    /// Does nothing if the queue is already being played. Tracks that fail
    /// to resolve, decode or encode are skipped. Fails only if the voice
    /// session is gone for good.
    pub async fn play(&self, announce: Id<ChannelMarker>) -> Result<(), PlaybackError> {
        let transport = {
            let mut player = self.shared.player.lock();
            if player.running {
                debug!("queue is already playing");
                return Ok(());
            }
            if player.queue.is_empty() {
                player.state = PlayerState::Idle;
                return Ok(());
            }
            // Taken under the player lock, the loop holding it gives it
            // back before clearing `running`.
            let Some(transport) = self.shared.transport.lock().take() else {
                return Err(PlaybackError::new(PlaybackErrorType::Unavailable));
            };
            player.running = true;
            player.skip = false;
            player.stop = false;
            player.state = PlayerState::Playing;
            transport
        };

        let mut playback = Playback {
            announcer: Announcer::new(Arc::clone(&self.shared.messenger), announce),
            info: self.shared.info.clone(),
            link: None,
            shared: Arc::clone(&self.shared),
            transport: Some(transport),
        };
        playback.run().await
    }
}

/// Packet state bound to one session key.
struct Link {
    info: Arc<VoiceConnectionInfo>,
    codec: PacketCodec,
    counters: PacketCounters,
}

impl Link {
    fn new(info: Arc<VoiceConnectionInfo>) -> Self {
        Self {
            codec: PacketCodec::new(&info),
            counters: PacketCounters::random(),
            info,
        }
    }
}

/// A running playback loop.
///
/// Dropping it, whether the loop ended or was cancelled, hands the
/// transport back and settles the player state.
struct Playback<R, M, T> {
    announcer: Announcer<M>,
    info: ConnectionInfo,
    link: Option<Link>,
    shared: Arc<Shared<R, M, T>>,
    transport: Option<T>,
}

impl<R: TrackResolver, M: Messenger, T: Transport> Playback<R, M, T> {
    async fn run(&mut self) -> Result<(), PlaybackError> {
        while let Some(track) = self.next_track() {
            let resolved = match self.shared.resolver.resolve(&track).await {
                Ok(resolved) => resolved,
                Err(error) => {
                    warn!(%track, ?error, "could not resolve track, skipping");
                    self.announcer.unavailable(&track).await;
                    continue;
                }
            };

            let metadata = resolved.metadata;
            self.begin(track, metadata.clone());
            let message = self.announcer.now_playing(&metadata).await;

            let end = match self.stream(resolved.data).await {
                Ok(end) => end,
                Err(error) if matches!(error.kind(), PlaybackErrorType::VoiceClosed) => {
                    self.announcer
                        .ended(message, &metadata, TrackEnd::Stopped)
                        .await;
                    return Err(error);
                }
                Err(error) => {
                    warn!(title = %metadata.title, ?error, "track aborted");
                    TrackEnd::Failed
                }
            };

            debug!(title = %metadata.title, ?end, "track ended");
            self.announcer.ended(message, &metadata, end).await;
            self.shared.player.lock().current = None;
        }

        debug!("queue is empty");
        Ok(())
    }

    fn next_track(&self) -> Option<TrackId> {
        let mut player = self.shared.player.lock();
        if player.stop {
            return None;
        }
        player.queue.pop_front()
    }

    fn begin(&self, track: TrackId, metadata: TrackMetadata) {
        let mut player = self.shared.player.lock();
        debug!(%track, title = %metadata.title, "starting track");
        player.current = Some((track, metadata));
        player.elapsed = 0;
        player.skip = false;
    }

    fn interrupted(&self) -> Option<TrackEnd> {
        let player = self.shared.player.lock();
        if player.stop {
            Some(TrackEnd::Stopped)
        } else if player.skip {
            Some(TrackEnd::Skipped)
        } else {
            None
        }
    }

    fn set_state(&self, state: PlayerState) {
        let mut player = self.shared.player.lock();
        if player.state != state {
            trace!(from = ?player.state, to = ?state, "player state changed");
            player.state = state;
        }
    }

    /// Streams one track, one frame per tick.
    async fn stream(&mut self, data: Vec<u8>) -> Result<TrackEnd, PlaybackError> {
        let frames = self.spawn_producer(data);

        let mut interval = tokio::time::interval(self.shared.config.frame_duration());
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            interval.tick().await;
            if let Some(end) = self.interrupted() {
                return Ok(end);
            }
            if let Some(end) = self.connect(&mut interval).await? {
                return Ok(end);
            }

            let frame = match frames.recv_async().await {
                Ok(Ok(frame)) => frame,
                Ok(Err(error)) => return Err(error.into()),
                Err(flume::RecvError::Disconnected) => return Ok(TrackEnd::Finished),
            };
            self.send(&frame)?;
        }
    }

    /// Decodes and encodes `data` on a blocking thread.
    ///
    /// The producer stops as soon as the receiver is dropped.
    fn spawn_producer(&self, data: Vec<u8>) -> flume::Receiver<Result<EncodedFrame, AudioError>> {
        let (tx, rx) = flume::bounded(self.shared.config.frame_buffer.max(1));
        let pipeline = AudioPipeline::new(self.shared.config);

        tokio::task::spawn_blocking(move || {
            let frames = match pipeline.frames(data) {
                Ok(frames) => frames,
                Err(error) => {
                    let _ = tx.send(Err(error));
                    return;
                }
            };

            for frame in frames {
                if tx.send(frame).is_err() {
                    trace!("frame receiver dropped, releasing decoder");
                    return;
                }
            }
        });
        rx
    }

    /// Makes sure packets go out under the latest session key, waiting for
    /// one if the voice connection is down.
    async fn connect(&mut self, interval: &mut Interval) -> Result<Option<TrackEnd>, PlaybackError> {
        let mut waited = false;
        loop {
            let published = self.info.borrow_and_update().clone();
            if let Some(info) = published {
                let current = self
                    .link
                    .as_ref()
                    .is_some_and(|link| Arc::ptr_eq(&link.info, &info));

                if !current {
                    self.transport_mut().connect(info.addr())?;
                    debug!(ssrc = info.ssrc, addr = %info.addr(), "voice transport connected");
                    self.link = Some(Link::new(info));
                }

                if waited {
                    interval.reset();
                }
                self.set_state(PlayerState::Playing);
                return Ok(None);
            }

            if !waited {
                debug!("waiting for voice connection info");
                self.set_state(PlayerState::AwaitingTransport);
                waited = true;
            }

            tokio::select! {
                changed = self.info.changed() => {
                    if changed.is_err() {
                        return Err(PlaybackError::new(PlaybackErrorType::VoiceClosed));
                    }
                }
                () = self.shared.wake.notified() => {
                    if let Some(end) = self.interrupted() {
                        return Ok(Some(end));
                    }
                }
            }
        }
    }

    fn send(&mut self, frame: &EncodedFrame) -> Result<(), PlaybackError> {
        let link = self
            .link
            .as_mut()
            .expect("link is established before the first frame");

        let samples = u32::try_from(self.shared.config.frame_size).unwrap_or(u32::MAX);
        let packet = link.codec.encode(&frame.data, samples, &mut link.counters)?;

        let transport = self
            .transport
            .as_ref()
            .expect("transport is held until the loop is dropped");
        if let Err(error) = transport.send(&packet) {
            debug!(?error, "dropped voice packet");
        }

        self.shared.player.lock().elapsed += frame.samples as u64;
        Ok(())
    }

    fn transport_mut(&mut self) -> &mut T {
        self.transport
            .as_mut()
            .expect("transport is held until the loop is dropped")
    }
}

impl<R, M, T> Drop for Playback<R, M, T> {
    fn drop(&mut self) {
        let mut player = self.shared.player.lock();
        if let Some(transport) = self.transport.take() {
            *self.shared.transport.lock() = Some(transport);
        }

        player.running = false;
        player.current = None;
        player.skip = false;
        player.state = if std::mem::take(&mut player.stop) {
            PlayerState::Stopped
        } else {
            PlayerState::Idle
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::wav;
    use crate::crypto::EncryptMode;
    use crate::messenger::MessengerError;
    use crate::net::udp::TransportError;
    use crate::packet::DecodedPacket;
    use crate::source::{ResolveError, ResolveErrorType, ResolvedTrack};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use twilight_model::id::marker::MessageMarker;

    const ANNOUNCE: Id<ChannelMarker> = Id::new(10);

    #[derive(Debug, Clone, Default)]
    struct RecordingTransport {
        connected: Arc<Mutex<Vec<SocketAddr>>>,
        packets: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl RecordingTransport {
        fn packets(&self) -> usize {
            self.packets.lock().len()
        }
    }

    impl Transport for RecordingTransport {
        fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
            self.connected.lock().push(addr);
            Ok(())
        }

        fn send(&self, packet: &[u8]) -> Result<(), TransportError> {
            self.packets.lock().push(packet.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Library {
        tracks: HashMap<TrackId, ResolvedTrack>,
        requests: Mutex<Vec<TrackId>>,
    }

    impl Library {
        fn with(mut self, id: &str, title: &str, frames: usize) -> Self {
            let track = ResolvedTrack {
                metadata: TrackMetadata {
                    title: title.to_string(),
                    duration: Duration::from_millis(frames as u64 / 48),
                    owner: "Someone".to_string(),
                },
                data: wav(48_000, 2, frames),
            };
            self.tracks.insert(TrackId::from(id), track);
            self
        }

        fn requests(&self) -> Vec<TrackId> {
            self.requests.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl TrackResolver for Library {
        async fn resolve(&self, track: &TrackId) -> Result<ResolvedTrack, ResolveError> {
            self.requests.lock().push(track.clone());
            self.tracks
                .get(track)
                .cloned()
                .ok_or(ResolveError::new(ResolveErrorType::NotFound))
        }
    }

    #[derive(Default)]
    struct Chat {
        messages: Mutex<Vec<String>>,
        edits: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Messenger for Chat {
        async fn send_message(
            &self,
            _channel: Id<ChannelMarker>,
            content: &str,
        ) -> Result<Id<MessageMarker>, MessengerError> {
            let mut messages = self.messages.lock();
            messages.push(content.to_string());
            Ok(Id::new(messages.len() as u64))
        }

        async fn edit_message(
            &self,
            _channel: Id<ChannelMarker>,
            _message: Id<MessageMarker>,
            content: &str,
        ) -> Result<(), MessengerError> {
            self.edits.lock().push(content.to_string());
            Ok(())
        }

        async fn add_reaction(
            &self,
            _channel: Id<ChannelMarker>,
            _message: Id<MessageMarker>,
            _emoji: &str,
        ) -> Result<(), MessengerError> {
            Ok(())
        }
    }

    type TestScheduler = Scheduler<Library, Chat, RecordingTransport>;

    struct Harness {
        scheduler: TestScheduler,
        library: Arc<Library>,
        chat: Arc<Chat>,
        transport: RecordingTransport,
        info: watch::Sender<Option<Arc<VoiceConnectionInfo>>>,
    }

    fn harness(library: Library, info: Option<Arc<VoiceConnectionInfo>>) -> Harness {
        let library = Arc::new(library);
        let chat = Arc::new(Chat::default());
        let transport = RecordingTransport::default();
        let (info, rx) = watch::channel(info);

        Harness {
            scheduler: Scheduler::new(
                PlayerConfig::default(),
                Arc::clone(&library),
                Arc::clone(&chat),
                transport.clone(),
                rx,
            ),
            library,
            chat,
            transport,
            info,
        }
    }

    fn connection(key: u8) -> Arc<VoiceConnectionInfo> {
        Arc::new(VoiceConnectionInfo {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 50004,
            ssrc: 42,
            secret_key: [key; 32],
            mode: EncryptMode::XSalsa20Poly1305Lite,
        })
    }

    fn decode_all(info: &VoiceConnectionInfo, packets: &[Vec<u8>]) -> Vec<DecodedPacket> {
        let codec = PacketCodec::new(info);
        packets
            .iter()
            .filter_map(|packet| codec.decode(packet).ok())
            .collect()
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition was not met in time");
    }

    #[tokio::test]
    async fn empty_queue_stays_idle() {
        let harness = harness(Library::default(), Some(connection(1)));

        harness.scheduler.play(ANNOUNCE).await.unwrap();

        let progress = harness.scheduler.progress();
        assert_eq!(progress.state, PlayerState::Idle);
        assert!(!progress.playing);
        assert_eq!(harness.transport.packets(), 0);
        assert!(harness.transport.connected.lock().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_track_is_skipped() {
        let info = connection(1);
        let harness = harness(
            Library::default().with("t2", "Second", 2880),
            Some(Arc::clone(&info)),
        );
        harness.scheduler.enqueue(TrackId::from("t1"));
        harness.scheduler.enqueue(TrackId::from("t2"));

        harness.scheduler.play(ANNOUNCE).await.unwrap();

        assert_eq!(
            harness.library.requests(),
            vec![TrackId::from("t1"), TrackId::from("t2")]
        );
        assert_eq!(
            *harness.chat.messages.lock(),
            vec![
                "Could not load track t1, skipping".to_string(),
                "Now playing: Second by Someone".to_string(),
            ]
        );
        assert_eq!(
            *harness.chat.edits.lock(),
            vec!["Played: Second by Someone".to_string()]
        );

        let packets = decode_all(&info, &harness.transport.packets.lock());
        assert_eq!(packets.len(), 3);
        for pair in packets.windows(2) {
            assert_eq!(pair[1].sequence, pair[0].sequence.wrapping_add(1));
            assert_eq!(pair[1].timestamp, pair[0].timestamp.wrapping_add(960));
            assert_eq!(pair[1].nonce, pair[0].nonce + 1);
        }
        assert_eq!(packets[0].nonce, 0);
        assert!(packets.iter().all(|packet| packet.ssrc == 42));

        assert_eq!(*harness.transport.connected.lock(), vec![info.addr()]);
        assert_eq!(harness.scheduler.state(), PlayerState::Idle);
    }

    #[tokio::test]
    async fn queue_is_fifo_during_playback() {
        let harness = harness(
            Library::default()
                .with("a", "A", 9600)
                .with("b", "B", 960)
                .with("c", "C", 960),
            Some(connection(1)),
        );
        harness.scheduler.enqueue(TrackId::from("a"));

        let scheduler = harness.scheduler.clone();
        let task = tokio::spawn(async move { scheduler.play(ANNOUNCE).await });

        eventually(|| harness.transport.packets() > 0).await;
        assert_eq!(harness.scheduler.enqueue(TrackId::from("b")), 0);
        assert_eq!(harness.scheduler.enqueue(TrackId::from("c")), 1);

        let progress = harness.scheduler.progress();
        assert!(progress.playing);
        assert_eq!(progress.track, Some(TrackId::from("a")));
        assert_eq!(progress.metadata.map(|metadata| metadata.title), Some("A".to_string()));
        assert_eq!(progress.queued, 2);

        // Already playing.
        harness.scheduler.play(ANNOUNCE).await.unwrap();

        task.await.unwrap().unwrap();
        assert_eq!(
            harness.library.requests(),
            vec![TrackId::from("a"), TrackId::from("b"), TrackId::from("c")]
        );
        assert_eq!(harness.transport.packets(), 10 + 1 + 1);
    }

    #[tokio::test]
    async fn skip_moves_to_next_track() {
        let info = connection(1);
        let harness = harness(
            Library::default()
                .with("a", "First", 96_000)
                .with("b", "Second", 2880),
            Some(Arc::clone(&info)),
        );
        harness.scheduler.enqueue(TrackId::from("a"));
        harness.scheduler.enqueue(TrackId::from("b"));

        let scheduler = harness.scheduler.clone();
        let task = tokio::spawn(async move { scheduler.play(ANNOUNCE).await });

        eventually(|| harness.transport.packets() >= 3).await;
        assert!(harness.scheduler.skip());
        let sent_before_skip = harness.transport.packets();
        task.await.unwrap().unwrap();

        assert_eq!(
            *harness.chat.edits.lock(),
            vec![
                "Skipped: First by Someone".to_string(),
                "Played: Second by Someone".to_string(),
            ]
        );

        // At most the frame already in flight follows the skip, then the 3
        // frames of the second track on the counters of the same key.
        let packets = decode_all(&info, &harness.transport.packets.lock());
        let first = packets.len() - 3;
        assert!(first >= sent_before_skip);
        assert!(first <= sent_before_skip + 1);
        for pair in packets.windows(2) {
            assert_eq!(pair[1].nonce, pair[0].nonce + 1);
        }
        assert!(!harness.scheduler.skip());
    }

    #[tokio::test]
    async fn stop_clears_queue() {
        let harness = harness(
            Library::default()
                .with("a", "First", 96_000)
                .with("b", "Second", 960),
            Some(connection(1)),
        );
        harness.scheduler.enqueue(TrackId::from("a"));
        harness.scheduler.enqueue(TrackId::from("b"));

        let scheduler = harness.scheduler.clone();
        let task = tokio::spawn(async move { scheduler.play(ANNOUNCE).await });

        eventually(|| harness.transport.packets() >= 2).await;
        harness.scheduler.stop();
        task.await.unwrap().unwrap();

        assert_eq!(harness.scheduler.state(), PlayerState::Stopped);
        assert!(harness.scheduler.queue().is_empty());
        assert_eq!(harness.library.requests(), vec![TrackId::from("a")]);
        assert_eq!(
            *harness.chat.edits.lock(),
            vec!["Stopped: First by Someone".to_string()]
        );
    }

    #[tokio::test]
    async fn waits_for_connection_info() {
        let harness = harness(Library::default().with("a", "A", 2880), None);
        harness.scheduler.enqueue(TrackId::from("a"));

        let scheduler = harness.scheduler.clone();
        let task = tokio::spawn(async move { scheduler.play(ANNOUNCE).await });

        eventually(|| harness.scheduler.state() == PlayerState::AwaitingTransport).await;
        assert_eq!(harness.transport.packets(), 0);
        assert!(!harness.scheduler.progress().playing);

        let info = connection(1);
        harness.info.send_replace(Some(Arc::clone(&info)));
        task.await.unwrap().unwrap();

        assert_eq!(decode_all(&info, &harness.transport.packets.lock()).len(), 3);
        assert_eq!(harness.scheduler.state(), PlayerState::Idle);
    }

    #[tokio::test]
    async fn new_key_resets_counters() {
        let first = connection(1);
        let harness = harness(
            Library::default().with("a", "A", 9600),
            Some(Arc::clone(&first)),
        );
        harness.scheduler.enqueue(TrackId::from("a"));

        let scheduler = harness.scheduler.clone();
        let task = tokio::spawn(async move { scheduler.play(ANNOUNCE).await });

        eventually(|| harness.transport.packets() >= 2).await;
        let second = connection(2);
        harness.info.send_replace(Some(Arc::clone(&second)));
        task.await.unwrap().unwrap();

        let packets = harness.transport.packets.lock().clone();
        let before = decode_all(&first, &packets);
        let after = decode_all(&second, &packets);

        assert_eq!(before.len() + after.len(), 10);
        assert!(before.len() >= 2);
        assert_eq!(after[0].nonce, 0);
        assert_eq!(harness.transport.connected.lock().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_play_calls_share_one_loop() {
        let harness = harness(Library::default().with("a", "A", 960), Some(connection(1)));

        for round in 0..20 {
            harness.scheduler.enqueue(TrackId::from("a"));
            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let scheduler = harness.scheduler.clone();
                    tokio::spawn(async move { scheduler.play(ANNOUNCE).await })
                })
                .collect();

            for task in tasks {
                task.await.unwrap().unwrap();
            }
            // A call that saw `running` may return before the loop ends.
            eventually(|| !harness.scheduler.shared.player.lock().running).await;
            assert_eq!(harness.library.requests().len(), round + 1);
        }

        assert!(harness.scheduler.shared.transport.lock().is_some());
        assert_eq!(harness.transport.packets(), 20);
    }

    #[tokio::test]
    async fn closed_voice_session_ends_playback() {
        let harness = harness(Library::default().with("a", "A", 960), None);
        harness.scheduler.enqueue(TrackId::from("a"));
        drop(harness.info);

        let error = harness.scheduler.play(ANNOUNCE).await.unwrap_err();
        assert!(matches!(error.kind(), PlaybackErrorType::VoiceClosed));
        assert_eq!(harness.scheduler.state(), PlayerState::Idle);
        assert_eq!(harness.transport.packets(), 0);
    }
}
