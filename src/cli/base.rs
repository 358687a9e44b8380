//! Base functionality for the DataPool CLI
//!
//! This module provides core utilities and traits used across the CLI
//! including:
//! - Logging initialisation
//! - Response handling and printing
//! - File parsing for JSON/YAML bodies
//! - Common traits for command processing

use std::error::Error;
use std::fs;
use std::path::Path;

use atty::Stream;
use colored::Colorize;
use colored_json::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::client::BaseClient;

/// Initialise tracing from `RUST_LOG`, defaulting to warnings only so the
/// executor's per-request debug lines stay out of normal CLI output.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Evaluates an operation result and prints the payload or error message,
/// then exits with the matching code.
pub fn evaluate_and_print_response<T: Serialize>(response: Result<T, String>) {
    match response {
        Ok(payload) => {
            let json = serde_json::to_string_pretty(&payload)
                .expect("operation payloads are always serializable");
            redirect_stream(&json);
            std::process::exit(exitcode::OK);
        }
        Err(e) => {
            print_error(e);
            std::process::exit(exitcode::DATAERR);
        }
    }
}

pub fn print_error(error: String) {
    println!("\n{} {}\n", "Error:".red().bold(), error);
}

/// If users are redirecting the output to a file, we only print the JSON
/// response so the output stays clean and usable in other scripts.
fn redirect_stream(json_str: &str) {
    if atty::is(Stream::Stdout) {
        println!("{}", success_message());
        println!("{}\n", json_str.to_colored_json_auto().unwrap());
    } else {
        println!("{}", json_str);
    }
}

fn success_message() -> String {
    format!(
        "{} {} - Received the following response: \n",
        "└── ".bold(),
        "🎉 Success!".green().bold()
    )
}

/// Parses a JSON or YAML file into the specified type.
pub fn parse_file<P, T>(path: P) -> Result<T, Box<dyn Error>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let content = fs::read_to_string(path)?;

    if let Ok(content) = serde_json::from_str(&content) {
        Ok(content)
    } else if let Ok(content) = serde_yaml::from_str(&content) {
        Ok(content)
    } else {
        Err("Failed to parse the file as either JSON or YAML".into())
    }
}

/// Trait for processing CLI subcommands
///
/// Implementors define how to handle their specific subcommand variant
/// using the provided API client.
pub trait Matcher {
    /// Process this subcommand using the given client
    fn process(self, client: &BaseClient);
}
