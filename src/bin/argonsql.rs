//! ArgonBase Shell Binary
//!
//! Interactive SQL-like shell over an ArgonBase data directory.

use std::io::{self, BufRead, Write};

use argonbase::command::split_statements;
use argonbase::{Config, Output, Session};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// ArgonBase Shell
#[derive(Parser, Debug)]
#[command(name = "argonsql")]
#[command(about = "Interactive shell for the ArgonBase storage engine")]
#[command(version)]
struct Args {
    /// Data directory (catalog/ and userData/ live under it)
    #[arg(short, long, default_value = "data")]
    data_dir: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(short, long, default_value = "warn,argonbase=info")]
    log_level: String,

    /// Sync every page write to disk
    #[arg(long)]
    sync: bool,

    /// Run these statements and exit instead of reading stdin
    #[arg(short, long)]
    execute: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Logs go to stderr so query output on stdout stays clean
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    tracing::info!("ArgonBase v{}", argonbase::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .sync_on_write(args.sync)
        .build();
    let prompt = config.prompt.clone();

    let mut session = match Session::open(config) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to open data directory: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(script) = args.execute {
        let (mut statements, rest) = split_statements(&script);
        if !rest.is_empty() {
            statements.push(rest);
        }
        for statement in statements {
            if !run(&mut session, &statement) {
                break;
            }
        }
        return;
    }

    repl(&mut session, &prompt);
}

/// Read statements from stdin until EXIT or end of input
fn repl(session: &mut Session, prompt: &str) {
    println!("ArgonBase v{}. Type HELP; for help.", argonbase::VERSION);
    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("{}", if buffer.is_empty() { prompt } else { "      -> " });
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        }

        buffer.push_str(&line);
        let (statements, rest) = split_statements(&buffer);
        buffer = rest;
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        for statement in statements {
            if !run(session, &statement) {
                return;
            }
        }
    }
}

/// Run one statement and print its outcome; false once the session ends
fn run(session: &mut Session, statement: &str) -> bool {
    match session.execute(statement) {
        Ok(Output::Exit) => {
            println!("{}", Output::Exit);
            false
        }
        Ok(output) => {
            println!("{}", output);
            true
        }
        Err(e) => {
            println!("Error: {}", e);
            true
        }
    }
}
