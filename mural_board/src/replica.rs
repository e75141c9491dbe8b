// Client-side replica of every player's drawing state.
//
// `Board` mirrors the server's session store by applying the broadcast
// stream in arrival order. It never touches the network: `client.rs` feeds
// it events on the caller's thread via `BoardClient::pump`, so the render
// layer reads a board that only changes between pumps.
//
// Where it differs from the server store:
// - No undo stack. `Undo` truncates; `Redo` rebuilds the scribble from the
//   pixel list the server attached to the rebroadcast.
// - Identity. The board starts with a placeholder record keyed by
//   `PlayerId::UNASSIGNED` and re-keys it when `Pong` delivers the real id.
// - Unknown ids. There is no join announcement; peers learn of a new player
//   from that player's first activity, so any event naming an id the board
//   has not seen materializes an empty record first.

use std::collections::BTreeMap;

use mural_protocol::event::{Event, EventBody, PlayerSnapshot};
use mural_protocol::types::{PlayerId, Scribble};

/// One participant as seen by this client. The render layer may toggle the
/// flags; history changes only by applying events.
pub struct Player {
    pub id: PlayerId,
    /// True between `Started` and `Done`.
    pub drawing: bool,
    /// Set when the player appeared via a catch-up snapshot; the render
    /// layer clears it after any join animation.
    pub just_joined: bool,
    scribbles: Vec<Scribble>,
}

impl Player {
    fn new(id: PlayerId) -> Self {
        Self {
            id,
            drawing: false,
            just_joined: false,
            scribbles: Vec::new(),
        }
    }

    fn from_snapshot(snapshot: PlayerSnapshot) -> Self {
        Self {
            id: snapshot.id,
            drawing: snapshot.drawing,
            just_joined: true,
            scribbles: snapshot.scribbles,
        }
    }

    /// Completed and in-progress strokes, oldest first.
    pub fn scribbles(&self) -> &[Scribble] {
        &self.scribbles
    }
}

/// Replica of the shared canvas, keyed by player id.
pub struct Board {
    players: BTreeMap<PlayerId, Player>,
    me: PlayerId,
}

impl Board {
    pub fn new() -> Self {
        let mut players = BTreeMap::new();
        players.insert(PlayerId::UNASSIGNED, Player::new(PlayerId::UNASSIGNED));
        Self {
            players,
            me: PlayerId::UNASSIGNED,
        }
    }

    /// The local player's id. `PlayerId::UNASSIGNED` until `Pong` arrives.
    pub fn local_id(&self) -> PlayerId {
        self.me
    }

    /// True once the server has assigned this client an id.
    pub fn has_identity(&self) -> bool {
        self.me != PlayerId::UNASSIGNED
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Mutable access for the render layer's flag toggles. History stays
    /// read-only through `Player::scribbles`.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// All known players in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Apply one received event. Every mutation of the canvas goes through
    /// here, the local player's own input included; the board changes only
    /// when the server's echo arrives.
    pub fn apply(&mut self, event: Event) {
        let player_id = event.player_id;
        match event.body {
            // The server never sends Ping.
            EventBody::Ping => {}
            EventBody::Pong => self.adopt_identity(player_id),
            EventBody::Joined { snapshot } => self.apply_snapshot(snapshot),
            EventBody::Left => {
                // The record stays; the canvas keeps the strokes.
                log::debug!("player {} left", player_id.0);
            }
            EventBody::Started => {
                let player = self.player_entry(player_id);
                player.drawing = true;
                player.scribbles.push(Scribble::new());
            }
            EventBody::Drawing { pixel } => {
                let player = self.player_entry(player_id);
                if let Some(open) = player.scribbles.last_mut() {
                    open.push(pixel);
                }
            }
            EventBody::Done => {
                self.player_entry(player_id).drawing = false;
            }
            EventBody::Undo => {
                self.player_entry(player_id).scribbles.pop();
            }
            EventBody::Redo { pixels } => {
                let player = self.player_entry(player_id);
                player.scribbles.push(Scribble::from_pixels(pixels));
                player.drawing = true;
            }
        }
    }

    /// Adopt the server-assigned identity by re-keying the placeholder.
    fn adopt_identity(&mut self, id: PlayerId) {
        if self.has_identity() {
            log::warn!("ignoring second Pong (already player {})", self.me.0);
            return;
        }
        if let Some(mut placeholder) = self.players.remove(&PlayerId::UNASSIGNED) {
            placeholder.id = id;
            self.players.insert(id, placeholder);
        }
        self.me = id;
        log::info!("assigned player id {}", id.0);
    }

    /// Bind a catch-up snapshot. The server's copy is authoritative for
    /// peers; the local record is never overwritten.
    fn apply_snapshot(&mut self, snapshot: PlayerSnapshot) {
        if snapshot.id == self.me {
            return;
        }
        self.players
            .insert(snapshot.id, Player::from_snapshot(snapshot));
    }

    /// Look up a player, materializing an empty record on first contact.
    fn player_entry(&mut self, id: PlayerId) -> &mut Player {
        self.players.entry(id).or_insert_with(|| Player::new(id))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
