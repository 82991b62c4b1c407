//! Connection supervision for the dispatch event stream.
//!
//! [`ConnectionSupervisor`] owns one logical session over an injected
//! [`Transport`]. It guarantees a single in-flight attempt, derives
//! connection state only from transport callbacks, and reports transport
//! failures as `connection-failed` events instead of errors.
//!
//! ```text
//! Disconnected --connect()--> Connecting --opened--> Connected
//! Connecting --failed--> Failed --connect()--> Connecting
//! Connected --closed / failed--> Disconnected
//! ```
//!
//! Retrying is the caller's decision; the supervisor never reconnects on
//! its own.

use fleetline_core::ConnectionState;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Subscription};
use crate::error::TransportError;
use crate::events::{ConnectionFailure, EventKind, StreamEvent};

/// Carrier for stream frames.
///
/// `open` must not block: it starts the attempt and reports progress
/// through the supplied [`TransportLink`], possibly from another task.
pub trait Transport: Send + Sync {
    /// Endpoint being dialled, for failure reports
    fn endpoint(&self) -> &str;

    /// Begin a connection attempt
    fn open(&self, link: TransportLink);

    /// Send an event over the open session
    fn send(&self, event: &StreamEvent) -> Result<(), TransportError>;

    /// Tear down the current session, if any
    fn close(&self);
}

#[derive(Debug, Default)]
struct Session {
    state: ConnectionState,
    attempt: u64,
    attempt_in_progress: bool,
}

struct Shared {
    session: Mutex<Session>,
    bus: EventBus,
    transport: Box<dyn Transport>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Callback handle given to a transport for one connection attempt.
///
/// Callbacks from an attempt that has since been superseded (by
/// `disconnect()` or a newer `connect()`) are ignored.
#[derive(Clone)]
pub struct TransportLink {
    attempt: u64,
    shared: Weak<Shared>,
}

impl TransportLink {
    /// Attempt number this link belongs to
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// The session is established
    pub fn opened(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        {
            let mut session = shared.session();
            if session.attempt != self.attempt || session.state != ConnectionState::Connecting {
                debug!(attempt = self.attempt, "ignoring open from superseded attempt");
                return;
            }
            session.state = ConnectionState::Connected;
            session.attempt_in_progress = false;
        }
        info!(endpoint = shared.transport.endpoint(), "event stream connected");
        shared.bus.emit(&StreamEvent::Connected);
    }

    /// The attempt failed or the open session broke
    pub fn failed(&self, message: impl Into<String>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let message = message.into();
        {
            let mut session = shared.session();
            if session.attempt != self.attempt {
                debug!(attempt = self.attempt, "ignoring failure from superseded attempt");
                return;
            }
            session.state = match session.state {
                ConnectionState::Connected => ConnectionState::Disconnected,
                ConnectionState::Connecting => ConnectionState::Failed,
                // Already reported for this attempt
                ConnectionState::Disconnected | ConnectionState::Failed => return,
            };
            session.attempt_in_progress = false;
        }
        let url = shared.transport.endpoint().to_string();
        warn!(%url, error = %message, "event stream connection failed");
        shared
            .bus
            .emit(&StreamEvent::ConnectionFailed(ConnectionFailure { message, url }));
    }

    /// The transport closed the session
    pub fn closed(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let state = {
            let session = shared.session();
            if session.attempt != self.attempt {
                return;
            }
            session.state
        };
        match state {
            ConnectionState::Connected => {}
            ConnectionState::Connecting => {
                self.failed("connection closed before it was established");
                return;
            }
            ConnectionState::Disconnected | ConnectionState::Failed => return,
        }
        {
            let mut session = shared.session();
            if session.attempt != self.attempt {
                return;
            }
            session.state = ConnectionState::Disconnected;
            session.attempt_in_progress = false;
        }
        info!(endpoint = shared.transport.endpoint(), "event stream disconnected");
        shared.bus.emit(&StreamEvent::Disconnected);
    }

    /// A domain event arrived
    pub fn deliver(&self, event: StreamEvent) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if event.kind().is_lifecycle() {
            debug!(kind = %event.kind(), "dropping lifecycle event received from the wire");
            return;
        }
        {
            let session = shared.session();
            if session.attempt != self.attempt || session.state != ConnectionState::Connected {
                debug!(kind = %event.kind(), "dropping event outside the current session");
                return;
            }
        }
        shared.bus.emit(&event);
    }
}

/// Owner of the event-stream session
#[derive(Clone)]
pub struct ConnectionSupervisor {
    shared: Arc<Shared>,
}

impl ConnectionSupervisor {
    /// Supervisor over `transport` with a fresh event bus
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_bus(transport, EventBus::new())
    }

    /// Supervisor publishing onto an existing bus
    pub fn with_bus<T: Transport + 'static>(transport: T, bus: EventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(Session::default()),
                bus,
                transport: Box::new(transport),
            }),
        }
    }

    /// Start a connection attempt.
    ///
    /// No-op while an attempt is pending or the session is established.
    /// Failures arrive later as `connection-failed` events.
    pub fn connect(&self) {
        let attempt = {
            let mut session = self.shared.session();
            if session.attempt_in_progress || session.state == ConnectionState::Connected {
                debug!(state = %session.state, "connect() ignored; attempt pending or connected");
                return;
            }
            session.attempt += 1;
            session.state = ConnectionState::Connecting;
            session.attempt_in_progress = true;
            session.attempt
        };

        info!(endpoint = self.shared.transport.endpoint(), attempt, "connecting to event stream");
        self.shared.transport.open(TransportLink {
            attempt,
            shared: Arc::downgrade(&self.shared),
        });
    }

    /// Close the session (or abandon the pending attempt)
    pub fn disconnect(&self) {
        let was_active = {
            let mut session = self.shared.session();
            let active = matches!(
                session.state,
                ConnectionState::Connected | ConnectionState::Connecting
            );
            // Invalidate callbacks from the abandoned attempt.
            session.attempt += 1;
            session.state = ConnectionState::Disconnected;
            session.attempt_in_progress = false;
            active
        };

        self.shared.transport.close();
        if was_active {
            info!(endpoint = self.shared.transport.endpoint(), "event stream closed by client");
            self.shared.bus.emit(&StreamEvent::Disconnected);
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.shared.session().state
    }

    /// Session established, per the last transport callback
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to a channel
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        self.shared.bus.on(kind, handler)
    }

    /// Event bus carrying this session's events
    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Send an event to the server; `false` when not connected or the send failed
    pub fn emit(&self, event: &StreamEvent) -> bool {
        if !self.is_connected() {
            debug!(kind = %event.kind(), "not connected; dropping outbound event");
            return false;
        }
        match self.shared.transport.send(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(kind = %event.kind(), error = %e, "failed to send event");
                false
            }
        }
    }
}
