//! Mini RESP Client CLI

mod format;

use chrono::Utc;
use clap::Parser;
use mini_resp::{ClientConfig, Error, Reply, Result, TcpClient};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};
use tracing_subscriber::EnvFilter;

struct ChronoUtc;

impl FormatTime for ChronoUtc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        // Format as RFC3339 UTC
        write!(w, "{}", Utc::now().to_rfc3339())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print replies as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    /// Load the config file, if any, then apply CLI overrides.
    fn resolve_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        Ok(config)
    }
}

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Command(Vec<String>),
    BeginBatch,
    DrainBatch,
    Reconnect,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(ChronoUtc)
        .with_writer(io::stderr)
        .init();

    println!("Mini RESP Client");
    println!("Connecting to {}...", config.addr());

    let mut client = match TcpClient::connect(config).await {
        Ok(client) => {
            println!("Connected successfully!");
            client
        }
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            return Err(e);
        }
    };

    let printer = Printer { json: args.json };

    // Interactive REPL
    loop {
        print!("{}", prompt(&client));
        io::stdout().flush()?;

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let input = match parse_input(&line) {
                    Ok(Some(input)) => input,
                    Ok(None) => continue,
                    Err(e) => {
                        eprintln!("{}", e);
                        continue;
                    }
                };

                if input == Input::Quit {
                    if let Err(e) = client.quit().await {
                        debug!("QUIT failed: {}", e);
                    }
                    break;
                }

                if let Err(e) = run(&mut client, input, &printer).await {
                    eprintln!("Error: {}", e);
                    if client.is_desynced() {
                        eprintln!("Connection lost sync with the server; use .reconnect");
                    }
                }
            }
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        }
    }

    if let Err(e) = client.close().await {
        debug!("Close failed: {}", e);
    }
    info!("Client exiting");
    println!("Goodbye!");
    Ok(())
}

async fn run(client: &mut TcpClient, input: Input, printer: &Printer) -> Result<()> {
    match input {
        Input::Command(args) => match client.call(&args[0], &args[1..]).await? {
            Some(reply) => printer.reply(&reply),
            None => println!("QUEUED"),
        },
        Input::BeginBatch => {
            client.begin_batch()?;
            println!("OK (pipelining; .drain to read replies)");
        }
        Input::DrainBatch => {
            let replies = client.drain_batch().await?;
            printer.batch(&replies);
        }
        Input::Reconnect => {
            client.reconnect().await?;
            println!("Reconnected to {}", client.config().addr());
        }
        Input::Quit => {}
    }
    Ok(())
}

fn prompt(client: &TcpClient) -> String {
    match client.pipeline_state() {
        mini_resp::client::PipelineState::Idle => format!("{}> ", client.config().addr()),
        mini_resp::client::PipelineState::Batching { pending } => {
            format!("{} (pipeline:{})> ", client.config().addr(), pending)
        }
    }
}

struct Printer {
    json: bool,
}

impl Printer {
    fn reply(&self, reply: &Reply) {
        if self.json {
            println!("{}", format::to_json(reply));
        } else {
            println!("{}", format::format_reply(reply));
        }
    }

    fn batch(&self, replies: &[Reply]) {
        if self.json {
            let values: Vec<_> = replies.iter().map(format::to_json).collect();
            println!("{}", serde_json::Value::Array(values));
        } else {
            println!("{}", format::format_batch(replies));
        }
    }
}

fn parse_input(line: &str) -> Result<Option<Input>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let input = match line {
        ".pipeline" => Input::BeginBatch,
        ".drain" => Input::DrainBatch,
        ".reconnect" => Input::Reconnect,
        _ if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") => {
            Input::Quit
        }
        _ => {
            let args = parse_command_line(line)?;
            if args.is_empty() {
                return Ok(None);
            }
            Input::Command(args)
        }
    };
    Ok(Some(input))
}

/// Parse command line with proper quote handling
fn parse_command_line(input: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current_arg = String::new();
    let mut in_quotes = false;
    // distinguishes `""` (an empty argument) from no argument at all
    let mut quoted = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            ' ' | '\t' if !in_quotes => {
                if !current_arg.is_empty() || quoted {
                    args.push(std::mem::take(&mut current_arg));
                    quoted = false;
                }
            }
            _ => current_arg.push(ch),
        }
    }

    if in_quotes {
        return Err(Error::Parse("Unclosed quotes".to_string()));
    }

    if !current_arg.is_empty() || quoted {
        args.push(current_arg);
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_plain_tokens() {
        assert_eq!(
            parse_command_line("set  key\tvalue").unwrap(),
            strings(&["set", "key", "value"])
        );
    }

    #[test]
    fn parses_quoted_tokens() {
        assert_eq!(
            parse_command_line(r#"SET greeting "hello world" """#).unwrap(),
            strings(&["SET", "greeting", "hello world", ""])
        );
    }

    #[test]
    fn rejects_unclosed_quotes() {
        assert!(matches!(
            parse_command_line(r#"SET k "oops"#),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn parses_meta_commands() {
        assert_eq!(parse_input("  \n").unwrap(), None);
        assert_eq!(parse_input(".pipeline\n").unwrap(), Some(Input::BeginBatch));
        assert_eq!(parse_input(".drain").unwrap(), Some(Input::DrainBatch));
        assert_eq!(parse_input(".reconnect").unwrap(), Some(Input::Reconnect));
        assert_eq!(parse_input("QUIT").unwrap(), Some(Input::Quit));
        assert_eq!(parse_input("exit").unwrap(), Some(Input::Quit));
        assert_eq!(
            parse_input("get k").unwrap(),
            Some(Input::Command(strings(&["get", "k"])))
        );
    }

    #[test]
    fn cli_overrides_config() {
        let args = Args {
            config: None,
            host: Some("10.0.0.2".to_string()),
            port: Some(6390),
            log_level: Some("debug".to_string()),
            json: false,
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.addr(), "10.0.0.2:6390");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.retry.attempts, 10);
    }
}
