use std::time::Duration;

/// Connection state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Waiting for the websocket to open.
    Connecting,
    /// Socket is open, waiting for the gateway to say hello.
    AwaitingHello,
    /// Identify has been sent.
    Identifying,
    /// Resume has been sent.
    Resuming,
    /// The gateway delivered a dispatch since the handshake.
    Ready,
    /// The gateway refused the session for good.
    Closed,
}

/// What has to be sent after the gateway said hello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Identify,
    Resume(ResumeToken),
}

/// Data needed to pick up a session where it left off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeToken {
    pub session_id: String,
    /// Last sequence seen, `None` if the gateway does not number dispatches.
    pub sequence: Option<i32>,
    /// Gateway URL the session must be resumed on, if it differs.
    pub resume_url: Option<String>,
}

/// Identifies a session which can later be resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resumable {
    pub session_id: String,
    pub resume_url: Option<String>,
}

/// State of a single gateway connection.
///
/// A session never outlives its connection: once the socket closes it is
/// replaced by its [successor](Session::successor), which only inherits
/// what is needed to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    state: SessionState,
    sequence: Option<i32>,
    heartbeat_interval: Option<Duration>,
    resume: Option<Resumable>,
}

impl Session {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            sequence: None,
            heartbeat_interval: None,
            resume: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn sequence(&self) -> Option<i32> {
        self.sequence
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    /// Gets the token a successor would resume with.
    #[must_use]
    pub fn resume_token(&self) -> Option<ResumeToken> {
        self.resume.as_ref().map(|resume| ResumeToken {
            session_id: resume.session_id.clone(),
            sequence: self.sequence,
            resume_url: resume.resume_url.clone(),
        })
    }

    /// The websocket has been opened.
    pub fn opened(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::AwaitingHello;
        }
    }

    /// The gateway said hello, decides between identifying and resuming.
    pub fn hello(&mut self, heartbeat_interval: Duration) -> Handshake {
        self.heartbeat_interval = Some(heartbeat_interval);
        match self.resume_token() {
            Some(token) => {
                self.state = SessionState::Resuming;
                Handshake::Resume(token)
            }
            None => {
                self.state = SessionState::Identifying;
                self.sequence = None;
                Handshake::Identify
            }
        }
    }

    /// A dispatch has been received.
    ///
    /// Sequence numbers only move forward, a late duplicate does not
    /// rewind them.
    pub fn dispatched(&mut self, sequence: Option<i32>, resumable: Option<Resumable>) {
        if let Some(sequence) = sequence {
            self.sequence = Some(self.sequence.map_or(sequence, |seq| seq.max(sequence)));
        }

        if let Some(resumable) = resumable {
            self.resume = Some(resumable);
        }

        if matches!(
            self.state,
            SessionState::Identifying | SessionState::Resuming
        ) {
            self.state = SessionState::Ready;
        }
    }

    /// The gateway invalidated the session. The next hello identifies.
    pub fn invalidate(&mut self) {
        self.resume = None;
    }

    /// The gateway closed the session for good.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Builds the session of the next connection.
    #[must_use]
    pub fn successor(&self) -> Self {
        Self {
            state: match self.state {
                SessionState::Closed => SessionState::Closed,
                _ => SessionState::Connecting,
            },
            sequence: self.sequence,
            heartbeat_interval: None,
            resume: self.resume.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
