// Length-delimited framing over TCP.
//
// One frame on the wire is a 4-byte big-endian length prefix followed by
// that many bytes of codec payload. Both helpers operate on raw `&[u8]` /
// `Vec<u8>`; encoding is the codec's job, which also lets the server
// encode an event once and write the same bytes to every recipient.
//
// `MAX_FRAME_SIZE` bounds the allocation a length prefix can demand. The
// largest legitimate frames are `Joined` catch-up snapshots carrying a
// player's full scribble history.

use std::io::{self, Read, Write};

/// Maximum allowed frame payload size (16 MiB). Join-time snapshots are the
/// largest expected frames; this is generous headroom even for a long
/// session's history.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Write one frame: 4-byte big-endian length, then the payload, then flush.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len = payload.len();
    if len > MAX_FRAME_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    #[expect(clippy::cast_possible_truncation)]
    let len_bytes = (len as u32).to_be_bytes();
    writer.write_all(&len_bytes)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, retrying short reads internally via `read_exact`.
///
/// Returns `UnexpectedEof` if the stream closes before or inside a frame,
/// and `InvalidData` if the length prefix exceeds `MAX_FRAME_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {MAX_FRAME_SIZE})"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
