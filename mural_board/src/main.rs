// Standalone mural server.
//
// Logging goes through env_logger; run with RUST_LOG=debug for per-event
// and bandwidth logs.

use std::thread;
use std::time::Duration;

use mural_board::server::{ServerConfig, start_server};

fn main() {
    env_logger::init();

    let config = parse_args();

    let (_handle, addr) = match start_server(config) {
        Ok(started) => started,
        Err(err) => {
            eprintln!("Failed to start server: {err}");
            std::process::exit(1);
        }
    };

    println!("Mural server listening on {addr}");
    println!("Press Ctrl+C to stop.");

    // The worker threads do everything; SIGINT tears the process down.
    loop {
        thread::sleep(Duration::from_millis(500));
    }
}

fn parse_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                config.port = args
                    .get(i)
                    .and_then(|value| value.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--port requires a valid port number");
                        std::process::exit(1);
                    });
            }
            "--tick-hz" => {
                i += 1;
                config.tick_hz = args
                    .get(i)
                    .and_then(|value| value.parse().ok())
                    .filter(|hz| *hz > 0)
                    .unwrap_or_else(|| {
                        eprintln!("--tick-hz requires a positive number");
                        std::process::exit(1);
                    });
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: mural-server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>     Listen port (default: 3120)");
    println!("  --tick-hz <N>     Broadcast ticks per second (default: 60)");
    println!("  --help, -h        Show this help");
}
