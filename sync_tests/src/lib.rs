// Shared harness for the end-to-end synchronization tests.
//
// `TestPainter` wraps `BoardClient` with blocking poll helpers so the test
// bodies read as scenarios. The timeouts are generous; the suite only waits
// that long when something is actually broken.

use std::time::{Duration, Instant};

use mural_board::client::BoardClient;
use mural_board::replica::Board;
use mural_protocol::types::{Color, Pixel, PlayerId, Vec2};

pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A test client that pumps its replica while waiting on conditions.
pub struct TestPainter {
    pub client: BoardClient,
}

impl TestPainter {
    /// Connect and wait until the server assigns an id.
    pub fn join(addr: &str) -> Self {
        let client = BoardClient::connect(addr).expect("connect failed");
        let mut painter = Self { client };
        painter.wait_for("server-assigned id", Board::has_identity);
        painter
    }

    pub fn id(&self) -> PlayerId {
        self.client.board().local_id()
    }

    /// Pump until the predicate holds, panicking after `POLL_TIMEOUT`.
    pub fn wait_for(&mut self, what: &str, mut predicate: impl FnMut(&Board) -> bool) {
        let start = Instant::now();
        while !predicate(self.client.board()) {
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for {what}"
            );
            self.client.pump();
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Draw one complete stroke.
    pub fn stroke(&self, pixels: &[Pixel]) {
        self.client.start_scribble();
        for pixel in pixels {
            self.client.draw(*pixel);
        }
        self.client.finish_scribble();
    }

    /// Number of scribbles this replica holds for `id`.
    pub fn scribble_count(&self, id: PlayerId) -> usize {
        self.client
            .board()
            .player(id)
            .map_or(0, |player| player.scribbles().len())
    }

    /// Pixels of scribble `index` for `id`; empty when absent.
    pub fn scribble_pixels(&self, id: PlayerId, index: usize) -> Vec<Pixel> {
        self.client
            .board()
            .player(id)
            .and_then(|player| player.scribbles().get(index))
            .map(|scribble| scribble.pixels().to_vec())
            .unwrap_or_default()
    }

    /// Orderly departure; returns once `Left` is on the wire.
    pub fn leave(self) {
        self.client.leave();
    }
}

/// A pixel at `(x, y)` with test-stable attributes.
pub fn px(x: f32, y: f32) -> Pixel {
    Pixel {
        center: Vec2::new(x, y),
        radius: 5.0,
        color: Color {
            r: 255,
            g: 128,
            b: 0,
            a: 255,
        },
    }
}
