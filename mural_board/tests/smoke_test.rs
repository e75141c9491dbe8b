// Black-box tests: a real server, raw TCP clients speaking the framed
// protocol directly. Each test gets its own server on a free port.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Duration;

use mural_board::server::{ServerConfig, ServerHandle, start_server};
use mural_protocol::codec;
use mural_protocol::event::{Event, EventBody, PlayerSnapshot};
use mural_protocol::framing::{read_frame, write_frame};
use mural_protocol::types::{Color, Pixel, PlayerId, Vec2};

struct RawClient {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    id: PlayerId,
}

fn start_test_server() -> (ServerHandle, String) {
    let (handle, addr) = start_server(ServerConfig {
        port: 0,
        tick_hz: 60,
    })
    .unwrap();
    (handle, addr.to_string())
}

fn send(writer: &mut BufWriter<TcpStream>, event: &Event) {
    let payload = codec::encode(event).unwrap();
    write_frame(writer, &payload).unwrap();
}

fn recv(reader: &mut BufReader<TcpStream>) -> Event {
    let payload = read_frame(reader).unwrap();
    codec::decode(&payload).unwrap()
}

fn px(x: f32, y: f32) -> Pixel {
    Pixel {
        center: Vec2::new(x, y),
        radius: 3.0,
        color: Color {
            r: 10,
            g: 200,
            b: 40,
            a: 255,
        },
    }
}

/// Connect, send `Ping`, wait for the `Pong`, then announce with `Joined`.
fn connect_and_join(addr: &str) -> RawClient {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = BufWriter::new(stream);

    send(
        &mut writer,
        &Event {
            player_id: PlayerId::UNASSIGNED,
            body: EventBody::Ping,
        },
    );
    let pong = recv(&mut reader);
    let id = match pong.body {
        EventBody::Pong => pong.player_id,
        other => panic!("expected Pong, got {other:?}"),
    };
    send(
        &mut writer,
        &Event {
            player_id: id,
            body: EventBody::Joined {
                snapshot: PlayerSnapshot::empty(id),
            },
        },
    );
    RawClient { reader, writer, id }
}

/// Collect everything queued for this client. The read timeout spans
/// several broadcast ticks, so an empty result means the server really has
/// nothing for us.
fn drain_events(client: &mut RawClient) -> Vec<Event> {
    client
        .reader
        .get_ref()
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();
    let mut events = Vec::new();
    for _ in 0..50 {
        match read_frame(&mut client.reader) {
            Ok(payload) => events.push(codec::decode(&payload).unwrap()),
            Err(_) => break,
        }
    }
    client
        .reader
        .get_ref()
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    events
}

fn send_stroke(client: &mut RawClient, pixels: &[Pixel]) {
    send(
        &mut client.writer,
        &Event {
            player_id: client.id,
            body: EventBody::Started,
        },
    );
    for pixel in pixels {
        send(
            &mut client.writer,
            &Event {
                player_id: client.id,
                body: EventBody::Drawing { pixel: *pixel },
            },
        );
    }
    send(
        &mut client.writer,
        &Event {
            player_id: client.id,
            body: EventBody::Done,
        },
    );
}

#[test]
fn first_joiner_gets_an_id_and_no_catchup() {
    let (handle, addr) = start_test_server();
    let mut alice = connect_and_join(&addr);
    assert_eq!(alice.id, PlayerId(1));
    assert!(drain_events(&mut alice).is_empty());
    handle.stop();
}

#[test]
fn second_joiner_gets_one_snapshot_and_no_stray_pong() {
    let (handle, addr) = start_test_server();
    let mut alice = connect_and_join(&addr);
    assert!(drain_events(&mut alice).is_empty());

    let mut bob = connect_and_join(&addr);
    assert_eq!(bob.id, PlayerId(2));

    let bob_events = drain_events(&mut bob);
    assert_eq!(bob_events.len(), 1, "got {bob_events:?}");
    assert_eq!(bob_events[0].player_id, bob.id);
    match &bob_events[0].body {
        EventBody::Joined { snapshot } => {
            assert_eq!(snapshot.id, alice.id);
            assert!(!snapshot.drawing);
            assert!(snapshot.scribbles.is_empty());
        }
        other => panic!("expected Joined, got {other:?}"),
    }

    // Alice sees the same catch-up broadcast; Bob's Pong stays private.
    let alice_events = drain_events(&mut alice);
    assert_eq!(alice_events.len(), 1, "got {alice_events:?}");
    assert!(matches!(alice_events[0].body, EventBody::Joined { .. }));
    handle.stop();
}

#[test]
fn strokes_echo_to_everyone_in_order() {
    let (handle, addr) = start_test_server();
    let mut alice = connect_and_join(&addr);
    let mut bob = connect_and_join(&addr);
    drain_events(&mut alice);
    drain_events(&mut bob);

    send_stroke(&mut alice, &[px(1.0, 1.0), px(2.0, 2.0)]);

    for client in [&mut bob, &mut alice] {
        let events = drain_events(client);
        let kinds: Vec<&EventBody> = events.iter().map(|e| &e.body).collect();
        assert_eq!(events.len(), 4, "got {kinds:?}");
        assert!(events.iter().all(|e| e.player_id == PlayerId(1)));
        assert!(matches!(events[0].body, EventBody::Started));
        assert!(matches!(events[1].body, EventBody::Drawing { .. }));
        assert!(matches!(events[2].body, EventBody::Drawing { .. }));
        assert!(matches!(events[3].body, EventBody::Done));
    }
    handle.stop();
}

#[test]
fn late_joiner_reconstructs_the_full_history() {
    let (handle, addr) = start_test_server();
    let mut alice = connect_and_join(&addr);
    let stroke = [px(1.0, 1.0), px(2.0, 1.5), px(3.0, 2.0)];
    send_stroke(&mut alice, &stroke);
    // Draining the echoes proves the server applied the stroke.
    assert_eq!(drain_events(&mut alice).len(), 5);

    let mut bob = connect_and_join(&addr);
    let replay = drain_events(&mut bob);
    assert_eq!(replay.len(), 1, "got {replay:?}");
    match &replay[0].body {
        EventBody::Joined { snapshot } => {
            assert_eq!(snapshot.id, alice.id);
            assert!(!snapshot.drawing);
            assert_eq!(snapshot.scribbles.len(), 1);
            assert_eq!(snapshot.scribbles[0].pixels(), &stroke[..]);
        }
        other => panic!("expected Joined, got {other:?}"),
    }
    handle.stop();
}

#[test]
fn undo_and_redo_reach_every_client() {
    let (handle, addr) = start_test_server();
    let mut alice = connect_and_join(&addr);
    let mut bob = connect_and_join(&addr);
    drain_events(&mut bob);
    send_stroke(&mut alice, &[px(4.0, 4.0)]);
    drain_events(&mut alice);
    drain_events(&mut bob);

    send(
        &mut alice.writer,
        &Event {
            player_id: alice.id,
            body: EventBody::Undo,
        },
    );
    for client in [&mut bob, &mut alice] {
        let events = drain_events(client);
        assert_eq!(events.len(), 1, "got {events:?}");
        assert_eq!(events[0].player_id, PlayerId(1));
        assert!(matches!(events[0].body, EventBody::Undo));
    }

    send(
        &mut alice.writer,
        &Event {
            player_id: alice.id,
            body: EventBody::Redo { pixels: Vec::new() },
        },
    );
    for client in [&mut bob, &mut alice] {
        let events = drain_events(client);
        assert_eq!(events.len(), 1, "got {events:?}");
        match &events[0].body {
            EventBody::Redo { pixels } => assert_eq!(pixels, &[px(4.0, 4.0)]),
            other => panic!("expected Redo, got {other:?}"),
        }
    }
    handle.stop();
}

#[test]
fn history_survives_a_disconnect() {
    let (handle, addr) = start_test_server();
    let mut alice = connect_and_join(&addr);
    send_stroke(&mut alice, &[px(7.0, 7.0)]);
    assert_eq!(drain_events(&mut alice).len(), 3);
    drop(alice);

    let mut bob = connect_and_join(&addr);
    let replay = drain_events(&mut bob);
    assert_eq!(replay.len(), 1, "got {replay:?}");
    match &replay[0].body {
        EventBody::Joined { snapshot } => {
            assert_eq!(snapshot.id, PlayerId(1));
            assert_eq!(snapshot.scribbles.len(), 1);
        }
        other => panic!("expected Joined, got {other:?}"),
    }
    handle.stop();
}

#[test]
fn left_is_broadcast_and_the_record_survives() {
    let (handle, addr) = start_test_server();
    let mut alice = connect_and_join(&addr);
    let mut bob = connect_and_join(&addr);
    drain_events(&mut alice);
    drain_events(&mut bob);

    send_stroke(&mut alice, &[px(5.0, 5.0)]);
    drain_events(&mut alice);
    drain_events(&mut bob);
    send(
        &mut alice.writer,
        &Event {
            player_id: alice.id,
            body: EventBody::Left,
        },
    );

    let events = drain_events(&mut bob);
    assert_eq!(events.len(), 1, "got {events:?}");
    assert_eq!(events[0].player_id, PlayerId(1));
    assert!(matches!(events[0].body, EventBody::Left));

    // A later joiner still replays the departed player's history.
    let mut carol = connect_and_join(&addr);
    let replay = drain_events(&mut carol);
    assert_eq!(replay.len(), 2, "got {replay:?}");
    handle.stop();
}

#[test]
fn malformed_frame_disconnects_only_that_client() {
    let (handle, addr) = start_test_server();
    let mut alice = connect_and_join(&addr);
    let mut bob = connect_and_join(&addr);
    drain_events(&mut alice);
    drain_events(&mut bob);

    write_frame(&mut alice.writer, b"not an event").unwrap();

    // Alice's connection is torn down.
    let mut saw_eof = false;
    for _ in 0..50 {
        if read_frame(&mut alice.reader).is_err() {
            saw_eof = true;
            break;
        }
    }
    assert!(saw_eof, "expected the server to close the connection");

    // Bob is unaffected.
    send(
        &mut bob.writer,
        &Event {
            player_id: bob.id,
            body: EventBody::Started,
        },
    );
    let events = drain_events(&mut bob);
    assert_eq!(events.len(), 1, "got {events:?}");
    assert!(matches!(events[0].body, EventBody::Started));
    handle.stop();
}
