mod debug_report;

use std::io::{self, IsTerminal, Read};
use streamrouter::{EngineConfig, Message, Stream, create};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let streams = match load_streams(&config.streams_path) {
        Ok(streams) => streams,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let message = match load_message(config.message_path.as_deref()) {
        Ok(message) => message,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let result = create(streams, EngineConfig::default());
    for dropped in &result.dropped {
        eprintln!("warning: dropped rule on stream {:?} field {:?}: {}", dropped.stream_id, dropped.field, dropped.detail);
    }

    match config.mode {
        Mode::Match => {
            let matched = result.engine.match_message(&message);
            if matched.is_empty() {
                println!("(no streams matched)");
            } else {
                for id in matched {
                    println!("{id}");
                }
            }
        }
        Mode::Test => {
            let reports = result.engine.test_match(&message);
            debug_report::print_test_match(&reports, config.color);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Match,
    Test,
}

struct CliConfig {
    streams_path: String,
    message_path: Option<String>,
    mode: Mode,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut streams_path: Option<String> = None;
    let mut message_path: Option<String> = None;
    let mut mode = Mode::Test;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("streamrouter {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--match" => mode = Mode::Match,
            "--test" => mode = Mode::Test,
            "--streams" | "-s" => {
                let value = args.next().ok_or_else(|| "error: --streams expects a path".to_string())?;
                streams_path = Some(value);
            }
            "--message" | "-m" => {
                let value = args.next().ok_or_else(|| "error: --message expects a path".to_string())?;
                message_path = Some(value);
            }
            _ if arg.starts_with("--streams=") => {
                streams_path = Some(arg.trim_start_matches("--streams=").to_string());
            }
            _ if arg.starts_with("--message=") => {
                message_path = Some(arg.trim_start_matches("--message=").to_string());
            }
            _ => return Err(format!("error: unknown option '{arg}'\n\n{}", help_text())),
        }
    }

    let streams_path = streams_path.ok_or_else(|| format!("error: --streams is required\n\n{}", help_text()))?;

    Ok(CliConfig { streams_path, message_path, mode, color })
}

fn load_streams(path: &str) -> Result<Vec<Stream>, String> {
    let text = std::fs::read_to_string(path).map_err(|err| format!("failed to read '{path}': {err}"))?;
    serde_json::from_str(&text).map_err(|err| format!("failed to parse streams from '{path}': {err}"))
}

fn load_message(path: Option<&str>) -> Result<Message, String> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path).map_err(|err| format!("failed to read '{path}': {err}"))?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(|err| format!("failed to read stdin: {err}"))?;
            buffer
        }
    };
    serde_json::from_str(&text).map_err(|err| format!("failed to parse message: {err}"))
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "streamrouter {version}

Stream routing engine CLI (diagnostic harness; not the production router).

Usage:
  streamrouter --streams <streams.json> [--message <message.json>] [OPTIONS]

Options:
  -s, --streams <path>       JSON array of streams to compile. Required.
  -m, --message <path>       JSON object message to match. Reads stdin if omitted.
  --match                    Print matched stream ids only (the hot-path result).
  --test                     Print a per-rule diagnostic report (default).
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  Internal error (bad streams/message JSON, I/O failure).
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
