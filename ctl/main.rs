#![forbid(unsafe_code)]

//! `metagen-ctl`: operator CLI companion for `metagen-queue`.
//!
//! Talks to the server's HTTP surface and prints JSON responses.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::{Client, Method, StatusCode};

#[derive(Debug, Parser)]
#[command(
    name = "metagen-ctl",
    about = "Operator CLI for the metagen-queue server",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of the server's HTTP surface.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show queue counts.
    Status,

    /// List sessions, optionally filtered by status.
    List {
        /// One of pending, grounding, generating, completed, failed, cancelled.
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one session.
    Show {
        /// Session ID.
        id: String,
    },

    /// Enqueue a session from a JSON input file.
    Enqueue {
        /// Path to the generation input JSON.
        file: PathBuf,
    },

    /// Cancel one session.
    Cancel {
        /// Session ID.
        id: String,
    },

    /// Cancel every pending and active session.
    CancelAll,
}

/// Method, path, and optional body for one command.
type Call = (Method, String, Option<serde_json::Value>);

fn build_call(command: &Command) -> std::result::Result<Call, Box<dyn std::error::Error>> {
    Ok(match command {
        Command::Status => (Method::GET, "/queue".into(), None),
        Command::List { status: None } => (Method::GET, "/sessions".into(), None),
        Command::List {
            status: Some(status),
        } => (Method::GET, format!("/sessions?status={status}"), None),
        Command::Show { id } => (Method::GET, format!("/sessions/{id}"), None),
        Command::Enqueue { file } => {
            let raw = std::fs::read_to_string(file)?;
            let body: serde_json::Value = serde_json::from_str(&raw)?;
            (Method::POST, "/sessions".into(), Some(body))
        }
        Command::Cancel { id } => (Method::POST, format!("/sessions/{id}/cancel"), None),
        Command::CancelAll => (Method::POST, "/sessions/cancel-all".into(), None),
    })
}

fn main() {
    let args = Cli::parse();

    let call = match build_call(&args.command) {
        Ok(call) => call,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(send(&args.url, call)) {
        Ok((status, body)) if status.is_success() => {
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        }
        Ok((status, body)) => {
            let err_msg = body
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error");
            eprintln!("Error ({status}): {err_msg}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("Failed to reach server: {err}");
            eprintln!("Is metagen-queue listening on '{}'?", args.url);
            std::process::exit(1);
        }
    }
}

/// Send one request and decode the JSON answer.
async fn send(
    base: &str,
    (method, path, body): Call,
) -> std::result::Result<(StatusCode, serde_json::Value), Box<dyn std::error::Error>> {
    let url = format!("{}{path}", base.trim_end_matches('/'));
    let mut request = Client::new().request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    let value = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
    Ok((status, value))
}
