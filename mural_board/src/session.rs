// Authoritative session state for the mural server.
//
// `SessionStore` is the structure the server's main thread drives: every
// player ever registered, each one's scribble history and undo stack, the
// write halves of live connections, and the queue of events awaiting the
// next broadcast tick. All mutation happens on that one thread, so there is
// no locking here.
//
// The lifecycle of a connection, as the store sees it:
//
// 1. `track_connection`: the listener accepted a socket; its write half is
//    parked until the client identifies itself.
// 2. `apply` with `Ping`: the connection becomes a registered player with a
//    fresh id, and a `Pong` carrying that id is queued.
// 3. `apply` with anything else: the per-player state machine runs and the
//    rebroadcast is queued in the same step, so the outbound order always
//    matches the order of application.
// 4. `release_conn`: the reader thread saw EOF or an error. The write half
//    is dropped; the player record and history stay, so late joiners can
//    still replay them.
//
// `flush` drains the queue once per tick: each event is encoded once and
// fanned out per its kind. `Pong` goes only to the player named in it;
// every other kind goes to every live connection, the originator included.

use std::collections::BTreeMap;
use std::io::BufWriter;
use std::mem;
use std::net::TcpStream;

use mural_protocol::codec;
use mural_protocol::event::{Event, EventBody, PlayerSnapshot};
use mural_protocol::framing::write_frame;
use mural_protocol::types::{PlayerId, Scribble};

/// Token for one accepted TCP connection, assigned by the server's main
/// thread. A client that reconnects gets a fresh token and, after `Ping`, a
/// fresh player id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConnId(pub u64);

/// One participant's server-side record. It outlives its connection: `Left`
/// and transport teardown clear the writer but keep the history.
struct PlayerSession {
    drawing: bool,
    scribbles: Vec<Scribble>,
    /// Undone scribbles, most recent last. `Redo` pops from here.
    deleted: Vec<Scribble>,
    conn: Option<ConnId>,
    writer: Option<BufWriter<TcpStream>>,
}

impl PlayerSession {
    fn new(conn: ConnId, writer: BufWriter<TcpStream>) -> Self {
        Self {
            drawing: false,
            scribbles: Vec::new(),
            deleted: Vec::new(),
            conn: Some(conn),
            writer: Some(writer),
        }
    }
}

/// Authoritative store of every player the server has seen.
pub struct SessionStore {
    players: BTreeMap<PlayerId, PlayerSession>,
    /// Write halves of connections that have not sent `Ping` yet.
    unregistered: BTreeMap<ConnId, BufWriter<TcpStream>>,
    /// Last id handed out; ids start at 1 and never repeat.
    next_id: i32,
    /// Events queued for the next `flush`, in application order.
    pending: Vec<Event>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            players: BTreeMap::new(),
            unregistered: BTreeMap::new(),
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Park the write half of a connection that has not identified itself.
    pub fn track_connection(&mut self, conn: ConnId, stream: TcpStream) {
        self.unregistered.insert(conn, BufWriter::new(stream));
    }

    /// Number of registered players, connected or not.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Apply one decoded event from `conn`. Mutation and the rebroadcast
    /// enqueue happen together; nothing is written to sockets until the
    /// next `flush`.
    pub fn apply(&mut self, conn: ConnId, event: Event) {
        let player_id = event.player_id;
        match event.body {
            EventBody::Ping => self.register(conn),
            // Only the server originates Pong; absorb rather than echo.
            EventBody::Pong => log::debug!("ignoring Pong from player {}", player_id.0),
            EventBody::Joined { snapshot: _ } => self.catch_up(player_id),
            EventBody::Left => {
                log::info!("player {} left, history retained", player_id.0);
                self.pending.push(Event {
                    player_id,
                    body: EventBody::Left,
                });
            }
            EventBody::Started => {
                let Some(session) = self.players.get_mut(&player_id) else {
                    log::debug!("Started for unknown player {}", player_id.0);
                    return;
                };
                session.drawing = true;
                session.scribbles.push(Scribble::new());
                self.pending.push(Event {
                    player_id,
                    body: EventBody::Started,
                });
            }
            EventBody::Drawing { pixel } => {
                let Some(session) = self.players.get_mut(&player_id) else {
                    log::debug!("Drawing for unknown player {}", player_id.0);
                    return;
                };
                // No open scribble means the append is dropped, but the
                // rebroadcast still goes out; replicas apply the same guard.
                if let Some(open) = session.scribbles.last_mut() {
                    open.push(pixel);
                }
                self.pending.push(Event {
                    player_id,
                    body: EventBody::Drawing { pixel },
                });
            }
            EventBody::Done => {
                let Some(session) = self.players.get_mut(&player_id) else {
                    log::debug!("Done for unknown player {}", player_id.0);
                    return;
                };
                session.drawing = false;
                self.pending.push(Event {
                    player_id,
                    body: EventBody::Done,
                });
            }
            EventBody::Undo => {
                let Some(session) = self.players.get_mut(&player_id) else {
                    log::debug!("Undo for unknown player {}", player_id.0);
                    return;
                };
                // Nothing to undo is a complete no-op: no rebroadcast.
                if let Some(scribble) = session.scribbles.pop() {
                    session.deleted.push(scribble);
                    self.pending.push(Event {
                        player_id,
                        body: EventBody::Undo,
                    });
                }
            }
            EventBody::Redo { pixels: _ } => {
                let Some(session) = self.players.get_mut(&player_id) else {
                    log::debug!("Redo for unknown player {}", player_id.0);
                    return;
                };
                // The inbound payload is only a request; the authoritative
                // pixel list comes from the undo stack.
                if let Some(scribble) = session.deleted.pop() {
                    self.pending.push(Event {
                        player_id,
                        body: EventBody::Redo {
                            pixels: scribble.pixels().to_vec(),
                        },
                    });
                    session.scribbles.push(scribble);
                    session.drawing = true;
                }
            }
        }
    }

    /// A connection's reader ended. Drop the write half; keep the record.
    pub fn release_conn(&mut self, conn: ConnId) {
        if self.unregistered.remove(&conn).is_some() {
            return;
        }
        if let Some((id, session)) = self
            .players
            .iter_mut()
            .find(|(_, session)| session.conn == Some(conn))
        {
            session.conn = None;
            session.writer = None;
            log::info!("connection closed for player {}", id.0);
        }
    }

    /// Drain the pending queue and fan each event out. Events queued while
    /// flushing wait for the next tick.
    pub fn flush(&mut self) {
        let outbound = mem::take(&mut self.pending);
        for event in outbound {
            let payload = match codec::encode(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    log::error!("dropping unencodable event: {err}");
                    continue;
                }
            };
            match event.body {
                EventBody::Pong => self.send_to(event.player_id, &payload),
                _ => self.broadcast(&payload),
            }
        }
    }

    /// Turn a pinging connection into a registered player and queue the
    /// `Pong` that tells the client its id.
    fn register(&mut self, conn: ConnId) {
        let Some(writer) = self.unregistered.remove(&conn) else {
            // Second Ping on the same connection; the first one owns it.
            log::warn!("ignoring repeat Ping on connection {}", conn.0);
            return;
        };
        self.next_id += 1;
        let id = PlayerId(self.next_id);
        self.players.insert(id, PlayerSession::new(conn, writer));
        log::info!("registered player {} on connection {}", id.0, conn.0);
        self.pending.push(Event {
            player_id: id,
            body: EventBody::Pong,
        });
    }

    /// `Joined` from `requester`: queue one snapshot of every other
    /// player's current state. The snapshots ride the ordinary broadcast
    /// queue, so the requester's replay and everyone else's refresh are the
    /// same frames.
    fn catch_up(&mut self, requester: PlayerId) {
        let snapshots: Vec<Event> = self
            .players
            .iter()
            .filter(|(id, _)| **id != requester)
            .map(|(id, session)| Event {
                player_id: requester,
                body: EventBody::Joined {
                    snapshot: PlayerSnapshot {
                        id: *id,
                        drawing: session.drawing,
                        scribbles: session.scribbles.clone(),
                    },
                },
            })
            .collect();
        log::debug!(
            "catch-up for player {}: {} snapshots",
            requester.0,
            snapshots.len()
        );
        self.pending.extend(snapshots);
    }

    /// Write one frame to one player, if a connection is live. A failed
    /// write is logged and skipped; the reader thread will observe the
    /// broken pipe and release the socket.
    fn send_to(&mut self, player_id: PlayerId, payload: &[u8]) {
        let writer = self
            .players
            .get_mut(&player_id)
            .and_then(|session| session.writer.as_mut());
        if let Some(writer) = writer {
            if let Err(err) = write_frame(writer, payload) {
                log::warn!("write to player {} failed: {err}", player_id.0);
            }
        }
    }

    /// Write one frame to every player with a live connection.
    fn broadcast(&mut self, payload: &[u8]) {
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in ids {
            self.send_to(id, payload);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
