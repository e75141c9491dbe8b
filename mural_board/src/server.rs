// TCP server: listener, per-connection reader threads, and the main loop
// that owns the `SessionStore`.
//
// Threading model:
// - The listener thread accepts sockets and forwards them over an mpsc
//   channel. It never touches session state.
// - Reader threads (one per connection) turn frames into decoded events and
//   forward them on the same channel. Any error, EOF included, becomes a
//   `Disconnected` and ends the thread.
// - The main thread is the only one that mutates the store or writes to
//   client sockets. It receives with a deadline-capped timeout so the
//   broadcast tick fires at a fixed rate (default 60 Hz) even when the
//   inbound side is busy; every tick flushes the pending queue.
//
// Once per second the main thread logs the inbound payload rate, fed by a
// shared counter the reader threads bump on every frame.
//
// Shutdown: `ServerHandle::stop` flips `keep_running` and joins the main
// thread. Reader threads re-check the flag once per frame, so one blocked
// in `read_frame` lingers until its client closes or sends again; the
// listener thread notices the flag on its next accept timeout.

use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use mural_protocol::codec;
use mural_protocol::event::Event;
use mural_protocol::framing::read_frame;

use crate::session::{ConnId, SessionStore};

/// Messages funneled from the listener and reader threads into the main
/// thread.
enum ServerEvent {
    NewConnection { stream: TcpStream },
    EventFrom { conn: ConnId, event: Event },
    Disconnected { conn: ConnId },
}

/// Configuration for `start_server`.
pub struct ServerConfig {
    /// Port to listen on; 0 picks a free one.
    pub port: u16,
    /// Broadcast ticks per second.
    pub tick_hz: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3120,
            tick_hz: 60,
        }
    }
}

/// Handle to a running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal the server to stop and wait for the main thread to exit.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Bind the listen socket and spawn the server threads. Returns the handle
/// and the bound address.
pub fn start_server(config: ServerConfig) -> std::io::Result<(ServerHandle, SocketAddr)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", config.port))?;
    let addr = listener.local_addr()?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_main = keep_running.clone();
    let thread = thread::spawn(move || {
        run_server(listener, config, keep_running_main);
    });

    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

fn run_server(listener: TcpListener, config: ServerConfig, keep_running: Arc<AtomicBool>) {
    let mut store = SessionStore::new();
    let (tx, rx): (Sender<ServerEvent>, Receiver<ServerEvent>) = mpsc::channel();
    let bytes_received = Arc::new(AtomicU64::new(0));

    // Accept without blocking forever so the thread can observe shutdown.
    listener.set_nonblocking(true).ok();
    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false).ok();
                    if tx_listener.send(ServerEvent::NewConnection { stream }).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(err) => {
                    log::error!("accept failed: {err}");
                    break;
                }
            }
        }
    });

    let tick_hz = config.tick_hz.max(1);
    let tick = Duration::from_secs(1) / tick_hz;
    let ticks_per_second = u64::from(tick_hz);
    let mut next_conn: u64 = 0;
    let mut next_flush = Instant::now() + tick;
    let mut ticks: u64 = 0;

    while keep_running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= next_flush {
            store.flush();
            ticks += 1;
            if ticks % ticks_per_second == 0 {
                report_inbound_rate(&bytes_received);
            }
            next_flush += tick;
            if next_flush < now {
                // A long stall left the deadline in the past; skip the
                // missed ticks instead of burst-flushing.
                next_flush = now + tick;
            }
            continue;
        }
        match rx.recv_timeout(next_flush - now) {
            Ok(event) => {
                handle_server_event(
                    &mut store,
                    event,
                    &mut next_conn,
                    &tx,
                    &bytes_received,
                    &keep_running,
                );
                // Drain whatever arrived in the meantime before waiting.
                while let Ok(event) = rx.try_recv() {
                    handle_server_event(
                        &mut store,
                        event,
                        &mut next_conn,
                        &tx,
                        &bytes_received,
                        &keep_running,
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    log::info!("server loop exiting");
}

fn handle_server_event(
    store: &mut SessionStore,
    event: ServerEvent,
    next_conn: &mut u64,
    tx: &Sender<ServerEvent>,
    bytes_received: &Arc<AtomicU64>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        ServerEvent::NewConnection { stream } => {
            let conn = ConnId(*next_conn);
            *next_conn += 1;
            let reader_stream = match stream.try_clone() {
                Ok(reader_stream) => reader_stream,
                Err(err) => {
                    log::warn!("dropping connection, clone failed: {err}");
                    return;
                }
            };
            store.track_connection(conn, stream);
            let tx_reader = tx.clone();
            let bytes_reader = bytes_received.clone();
            let keep_running_reader = keep_running.clone();
            thread::spawn(move || {
                reader_loop(
                    conn,
                    BufReader::new(reader_stream),
                    tx_reader,
                    bytes_reader,
                    keep_running_reader,
                );
            });
            log::debug!("connection {} accepted", conn.0);
        }
        ServerEvent::EventFrom { conn, event } => store.apply(conn, event),
        ServerEvent::Disconnected { conn } => store.release_conn(conn),
    }
}

/// Read frames off one connection until EOF, a transport error, or a
/// payload that does not decode.
fn reader_loop(
    conn: ConnId,
    mut reader: BufReader<TcpStream>,
    tx: Sender<ServerEvent>,
    bytes_received: Arc<AtomicU64>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match read_frame(&mut reader) {
            Ok(payload) => {
                bytes_received.fetch_add(payload.len() as u64, Ordering::Relaxed);
                match codec::decode(&payload) {
                    Ok(event) => {
                        if tx.send(ServerEvent::EventFrom { conn, event }).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        log::warn!("connection {}: dropping, {err}", conn.0);
                        break;
                    }
                }
            }
            Err(err) => {
                log::debug!("connection {}: read ended: {err}", conn.0);
                break;
            }
        }
    }
    let _ = tx.send(ServerEvent::Disconnected { conn });
}

fn report_inbound_rate(bytes_received: &AtomicU64) {
    let bytes = bytes_received.swap(0, Ordering::Relaxed);
    if bytes > 0 {
        log::debug!("inbound {}/s", pretty_si_bytes(bytes));
    }
}

/// Format a byte count with SI prefixes: `812.0B`, `1.5kB`, `2.3MB`.
fn pretty_si_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["", "k", "M", "G", "T", "P", "E", "Z"] {
        if value < 1000.0 {
            return format!("{value:.1}{unit}B");
        }
        value /= 1000.0;
    }
    format!("{value:.1}YB")
}
