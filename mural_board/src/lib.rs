// mural_board: the replicated drawing-state engine for Mural.
//
// Both halves of canvas synchronization over the `mural_protocol` wire
// format live here.
//
// Server side:
// - `session`: `SessionStore`, the authoritative per-player scribble
//   history, undo stacks, pending broadcast queue, and fan-out write paths.
// - `server`: TCP listener, one reader thread per connection, and the
//   store-owning main loop with its fixed-rate broadcast tick.
//
// Client side:
// - `replica`: `Board`, the local mirror of every player's history,
//   rebuilt by applying the received event stream.
// - `client`: `BoardClient`, connection bootstrap, reader thread, send
//   batcher, and the per-frame `pump` into the `Board`.
//
// The server runs standalone (binary `mural-server`) or embedded via
// `start_server`. The client is a library API for a rendering layer; it
// exposes replica state that changes only inside `pump`, on the caller's
// thread.

pub mod client;
pub mod replica;
pub mod server;
pub mod session;

pub use client::BoardClient;
pub use replica::{Board, Player};
pub use server::{ServerConfig, ServerHandle, start_server};
