// mural_protocol: wire protocol for shared-canvas synchronization.
//
// This crate defines the event vocabulary, codec, and framing used by the
// mural server (`mural_board::server`) and drawing clients to communicate
// over TCP. It is shared between both sides and has no dependency on the
// board engine or any rendering code.
//
// Module overview:
// - `types.rs`:   Drawing primitives: `PlayerId`, `Vec2`, `Color`, `Pixel`,
//                 `Bounds`, `Scribble`.
// - `event.rs`:   The `Event` union (`EventBody` kinds) and `PlayerSnapshot`.
// - `codec.rs`:   JSON encode/decode between events and frame payloads, with
//                 a typed `CodecError`.
// - `framing.rs`: Length-delimited framing over any `Read`/`Write` stream:
//                 4-byte big-endian length prefix, then codec payload.
//
// Design decisions:
// - **JSON serialization.** Debuggable on the wire and the schema lives in
//   the type definitions. A binary encoding can be swapped in later if
//   bandwidth matters.
// - **One event union for both directions.** Client and server speak the
//   same vocabulary; a kind that one side never originates (`Pong` from a
//   client, `Ping` from the server) is absorbed as a no-op by the receiver.
// - **No async runtime.** Uses `std::io::Read`/`Write` for framing,
//   compatible with blocking TCP streams and buffered wrappers.

pub mod codec;
pub mod event;
pub mod framing;
pub mod types;

pub use codec::{CodecError, decode, encode};
pub use event::{Event, EventBody, PlayerSnapshot};
pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use types::{Bounds, Color, Pixel, PlayerId, Scribble, Vec2};
