// Protocol events for canvas synchronization.
//
// A single `Event` type travels in both directions: clients send their own
// input events, the server rebroadcasts them (and emits `Pong` plus catch-up
// `Joined` events of its own). `EventBody` is the closed set of kinds,
// exhaustively matched by both stores. Serde's external tagging doubles as
// the wire kind discriminator.

use serde::{Deserialize, Serialize};

use crate::types::{Pixel, PlayerId, Scribble};

/// A typed, player-attributed message. Events are the only mutation channel
/// for player state on either side of the connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub player_id: PlayerId,
    pub body: EventBody,
}

/// Event kinds and their payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventBody {
    /// First frame a client sends: request an identity.
    Ping,
    /// Server's handshake reply. The assigned id rides in the event's
    /// `player_id` field; there is no payload.
    Pong,
    /// From a client: announce itself after `Pong` (payload ignored by the
    /// server). From the server: catch-up describing one existing player;
    /// the event's `player_id` is the requester, the snapshot's `id` is the
    /// described player.
    Joined { snapshot: PlayerSnapshot },
    /// Client is leaving. Always the last event a client sends.
    Left,
    /// Pointer down: a new empty scribble begins.
    Started,
    /// One point sample appended to the player's open scribble.
    Drawing { pixel: Pixel },
    /// Pointer up: the open scribble is finished.
    Done,
    /// Remove the player's newest scribble.
    Undo,
    /// Restore the most recently undone scribble. Carries the full pixel
    /// list so replicas need no deleted stack of their own.
    Redo { pixels: Vec<Pixel> },
}

/// One player's complete drawing state, as carried by `Joined`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub drawing: bool,
    pub scribbles: Vec<Scribble>,
}

impl PlayerSnapshot {
    /// The payload a client attaches to its own join request. The server
    /// treats an inbound `Joined` as a request, not data.
    pub fn empty(id: PlayerId) -> Self {
        Self {
            id,
            drawing: false,
            scribbles: Vec::new(),
        }
    }
}
