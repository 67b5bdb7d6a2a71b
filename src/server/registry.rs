// ABOUTME: Session registry arbitrating who may connect and who may speak
// ABOUTME: Single mutex over the active client and active speaker slots

use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Unique connection identifier, assigned when the WebSocket upgrade completes
pub type ConnectionId = Uuid;

/// How many connections may stay attached at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AdmissionPolicy {
    /// Any number of listeners, at most one active speaker
    #[default]
    SingleSpeaker,
    /// One connection at a time; others are rejected at the handshake
    SingleClient,
}

impl AdmissionPolicy {
    /// Convert to config string
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPolicy::SingleSpeaker => "single-speaker",
            AdmissionPolicy::SingleClient => "single-client",
        }
    }
}

/// Outcome of a speaker request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerGrant {
    /// The connection holds the floor
    Granted,
    /// Another connection holds the floor
    Rejected,
}

#[derive(Debug, Default)]
struct Slots {
    /// Only populated under `AdmissionPolicy::SingleClient`
    active_client: Option<ConnectionId>,
    active_speaker: Option<ConnectionId>,
    connected: usize,
}

/// Process-wide arbiter for admission and the speaker role.
///
/// Every check-and-set happens under one lock, so two connections can never
/// both be granted. The lock is only held for a few comparisons and is never
/// touched by the audio callback.
#[derive(Debug)]
pub struct SessionRegistry {
    policy: AdmissionPolicy,
    slots: Mutex<Slots>,
}

impl SessionRegistry {
    /// Create a new registry with the given admission policy
    pub fn new(policy: AdmissionPolicy) -> Self {
        Self {
            policy,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Admission policy in force
    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Admit a new connection.
    ///
    /// Returns `None` if the policy rejects it. The returned registration
    /// releases every slot the connection holds when dropped.
    pub fn admit(self: &Arc<Self>, id: ConnectionId) -> Option<Registration> {
        let mut slots = self.slots.lock();

        if self.policy == AdmissionPolicy::SingleClient {
            if let Some(current) = slots.active_client {
                log::info!("Connection {} rejected, {} is already connected", id, current);
                return None;
            }
            slots.active_client = Some(id);
        }

        slots.connected += 1;
        log::info!("Connection {} admitted, total connections: {}", id, slots.connected);

        Some(Registration {
            registry: Arc::clone(self),
            id,
        })
    }

    /// Try to give `id` the floor
    pub fn request_speaker(&self, id: ConnectionId) -> SpeakerGrant {
        let mut slots = self.slots.lock();
        match slots.active_speaker {
            None => {
                slots.active_speaker = Some(id);
                log::info!("Speaker granted to {}", id);
                SpeakerGrant::Granted
            }
            Some(current) if current == id => SpeakerGrant::Granted,
            Some(current) => {
                log::info!("Speaker request from {} rejected, {} holds the floor", id, current);
                SpeakerGrant::Rejected
            }
        }
    }

    /// Whether `id` currently holds the floor
    pub fn is_speaker(&self, id: ConnectionId) -> bool {
        self.slots.lock().active_speaker == Some(id)
    }

    /// Current speaker, if any
    pub fn active_speaker(&self) -> Option<ConnectionId> {
        self.slots.lock().active_speaker
    }

    /// Current exclusive client, if the single-client policy is in force
    pub fn active_client(&self) -> Option<ConnectionId> {
        self.slots.lock().active_client
    }

    /// Number of admitted connections
    pub fn connection_count(&self) -> usize {
        self.slots.lock().connected
    }

    fn release(&self, id: ConnectionId) {
        let mut slots = self.slots.lock();
        if slots.active_client == Some(id) {
            slots.active_client = None;
        }
        if slots.active_speaker == Some(id) {
            slots.active_speaker = None;
            log::info!("Speaker {} released the floor", id);
        }
        slots.connected = slots.connected.saturating_sub(1);
        log::info!("Connection {} released, total connections: {}", id, slots.connected);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(AdmissionPolicy::default())
    }
}

/// An admitted connection's hold on the registry.
///
/// Dropping it clears the connection from both slots, whichever way the
/// session ends.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<SessionRegistry>,
    id: ConnectionId,
}

impl Registration {
    /// Connection this registration belongs to
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Try to take the floor
    pub fn request_speaker(&self) -> SpeakerGrant {
        self.registry.request_speaker(self.id)
    }

    /// Whether this connection currently holds the floor
    pub fn is_speaker(&self) -> bool {
        self.registry.is_speaker(self.id)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
