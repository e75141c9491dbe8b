// TCP client for a mural server: connection bootstrap, reader thread, send
// batcher, and the pump that applies received events to the replica.
//
// `connect` dials, writes the `Ping` frame directly, then hands the socket
// halves to two background threads:
// - The reader turns frames into decoded events and queues them in an mpsc
//   inbox. EOF, transport errors, and undecodable payloads end the thread.
// - The batcher owns the write half. It drains an outbox of locally
//   originated events, flushing in enqueue order on a 2 ms cadence, or
//   immediately once a batch grows past 50 events. After physically
//   writing `Left` it exits; `leave` joins it, which is the guarantee that
//   the goodbye reached the OS before the process moves on. A write error
//   also ends the thread, so `leave` cannot hang on a dead server.
//
// `pump` runs on the caller's thread: it drains the inbox into the owned
// `Board`. Local input is never applied locally; a stroke appears on this
// client's own canvas only when the server's echo comes back, so every
// replica applies the same events in the same per-player order.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mural_protocol::codec;
use mural_protocol::event::{Event, EventBody, PlayerSnapshot};
use mural_protocol::framing::{read_frame, write_frame};
use mural_protocol::types::{Pixel, PlayerId};

use crate::replica::Board;

/// Flush cadence of the send batcher.
const FLUSH_INTERVAL: Duration = Duration::from_millis(2);

/// A batch longer than this flushes immediately instead of waiting for the
/// timer.
const MAX_BATCH: usize = 50;

/// Handle to one server connection: the replica, the outbox, and the two
/// background threads.
pub struct BoardClient {
    board: Board,
    inbox: Receiver<Event>,
    outbox: Sender<Event>,
    batcher: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl BoardClient {
    /// Dial the server and send `Ping`. The returned client has no identity
    /// yet; keep pumping until `board().has_identity()` before drawing.
    pub fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let reader_stream = stream.try_clone()?;
        let mut writer = BufWriter::new(stream);

        // Ping goes out directly; the batcher owns the writer afterwards.
        write_event(
            &mut writer,
            &Event {
                player_id: PlayerId::UNASSIGNED,
                body: EventBody::Ping,
            },
        )?;

        let connected = Arc::new(AtomicBool::new(true));

        let (inbox_tx, inbox) = mpsc::channel();
        let connected_reader = connected.clone();
        thread::spawn(move || {
            reader_loop(BufReader::new(reader_stream), inbox_tx, connected_reader);
        });

        let (outbox, outbox_rx) = mpsc::channel();
        let connected_batcher = connected.clone();
        let batcher = thread::spawn(move || {
            batcher_loop(writer, outbox_rx, connected_batcher);
        });

        Ok(Self {
            board: Board::new(),
            inbox,
            outbox,
            batcher: Some(batcher),
            connected,
        })
    }

    /// Drain the inbox and apply every event to the replica. Returns the
    /// number applied. Call once per frame from the owning thread.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.inbox.try_recv() {
            // Only the Pong that assigns our identity triggers the join
            // announcement; the board ignores any repeat.
            let adopting = matches!(event.body, EventBody::Pong) && !self.board.has_identity();
            self.board.apply(event);
            if adopting {
                // Announce ourselves so the server replays everyone else's
                // history and peers pick us up as we start drawing.
                self.enqueue(EventBody::Joined {
                    snapshot: PlayerSnapshot::empty(self.board.local_id()),
                });
            }
            applied += 1;
        }
        applied
    }

    /// The replica. Stable between calls to `pump`.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Mutable replica access for render-layer flag toggles.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    /// True while both transport threads are healthy.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Queue one locally originated event for transmission.
    pub fn enqueue(&self, body: EventBody) {
        let event = Event {
            player_id: self.board.local_id(),
            body,
        };
        if self.outbox.send(event).is_err() {
            log::warn!("event dropped, batcher has exited");
        }
    }

    /// Pointer down.
    pub fn start_scribble(&self) {
        self.enqueue(EventBody::Started);
    }

    /// One point sample of the stroke in progress.
    pub fn draw(&self, pixel: Pixel) {
        self.enqueue(EventBody::Drawing { pixel });
    }

    /// Pointer up.
    pub fn finish_scribble(&self) {
        self.enqueue(EventBody::Done);
    }

    pub fn undo(&self) {
        self.enqueue(EventBody::Undo);
    }

    /// Ask the server to restore the last undone scribble. The pixel list
    /// comes back in the rebroadcast.
    pub fn redo(&self) {
        self.enqueue(EventBody::Redo { pixels: Vec::new() });
    }

    /// Orderly exit: queue `Left`, then wait until the batcher has written
    /// it out (or died trying).
    pub fn leave(mut self) {
        self.enqueue(EventBody::Left);
        if let Some(batcher) = self.batcher.take() {
            let _ = batcher.join();
        }
    }
}

/// Encode and frame one event. An encode failure drops the event; an I/O
/// failure propagates.
fn write_event(writer: &mut BufWriter<TcpStream>, event: &Event) -> std::io::Result<()> {
    match codec::encode(event) {
        Ok(payload) => write_frame(writer, &payload),
        Err(err) => {
            log::error!("dropping unencodable event: {err}");
            Ok(())
        }
    }
}

/// Reader thread: framed events into the inbox until EOF or error.
fn reader_loop(mut reader: BufReader<TcpStream>, inbox: Sender<Event>, connected: Arc<AtomicBool>) {
    loop {
        match read_frame(&mut reader) {
            Ok(payload) => match codec::decode(&payload) {
                Ok(event) => {
                    // A send error means the client handle was dropped.
                    if inbox.send(event).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("disconnecting, undecodable frame: {err}");
                    break;
                }
            },
            Err(err) => {
                log::debug!("server connection closed: {err}");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

/// Batcher thread: accumulate outbound events and flush them in enqueue
/// order, on the timer or once the batch grows past `MAX_BATCH`. Exits
/// after writing `Left`, on a write error, or when the handle is dropped.
fn batcher_loop(
    mut writer: BufWriter<TcpStream>,
    outbox: Receiver<Event>,
    connected: Arc<AtomicBool>,
) {
    let mut batch: Vec<Event> = Vec::new();
    let mut next_flush = Instant::now() + FLUSH_INTERVAL;
    loop {
        let now = Instant::now();
        if now >= next_flush {
            if !batch.is_empty() && flush_batch(&mut writer, &mut batch).is_err() {
                break;
            }
            next_flush = now + FLUSH_INTERVAL;
            continue;
        }
        match outbox.recv_timeout(next_flush - now) {
            Ok(event) => {
                let leaving = matches!(event.body, EventBody::Left);
                batch.push(event);
                if leaving {
                    // Left is the last event this connection ever sends;
                    // writing it releases the barrier in `leave`.
                    let _ = flush_batch(&mut writer, &mut batch);
                    break;
                }
                if batch.len() > MAX_BATCH && flush_batch(&mut writer, &mut batch).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Handle dropped without leave(); push out what is left.
                let _ = flush_batch(&mut writer, &mut batch);
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

/// Write every batched event in order, then clear the batch.
fn flush_batch(writer: &mut BufWriter<TcpStream>, batch: &mut Vec<Event>) -> std::io::Result<()> {
    for event in batch.drain(..) {
        write_event(writer, &event)?;
    }
    Ok(())
}
