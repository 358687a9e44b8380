//! Authentication-related CLI commands and profile management
//!
//! This module provides functionality for:
//! - Managing authentication profiles with server URLs and token pairs
//! - Securely storing credentials in the system keyring
//! - Interactive credential prompts

use colored::Colorize;
use dialoguer::Input;
use keyring::Entry;
use rpassword::prompt_password;
use serde::{Deserialize, Serialize};
use structopt::StructOpt;
use url::Url;

use crate::client::BaseClient;

use super::base::Matcher;

const KEYRING_SERVICE: &str = "dpcli";

/// A stored connection profile: server URL plus token material. The
/// refresh token is optional; without it the session cannot renew itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthProfile {
    name: String,
    url: String,
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl AuthProfile {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        AuthProfile {
            name: name.into(),
            url: url.into(),
            token: token.into(),
            refresh_token,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Store this profile in the system keyring under its name.
    pub fn store_in_keyring(&self) -> Result<(), Box<dyn std::error::Error>> {
        let entry = Entry::new(KEYRING_SERVICE, &self.name)?;
        entry.set_password(&serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Load a profile from the system keyring by name.
    pub fn get_from_keyring(name: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let entry = Entry::new(KEYRING_SERVICE, name)?;
        let raw = entry.get_password()?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Interactively prompts for a server URL and token material.
///
/// # Returns
/// A tuple of (url, token, optional refresh token).
pub fn prompt_for_credentials(
) -> Result<(String, String, Option<String>), Box<dyn std::error::Error>> {
    println!("\n{}", "🔗 Setting up the DataPool connection...".bold().cyan());
    println!("{}", "─".repeat(50).dimmed());

    let base_url: String = Input::new()
        .with_prompt(format!("{} {}", "🌐".bold(), "Server URL".bold().green()))
        .interact_text()?;

    // Basic sanity check before anything is stored
    Url::parse(&base_url)?;

    println!(
        "\n{} {}",
        "🔑".bold(),
        "Access token (input is hidden)".bold().green()
    );
    let token = prompt_password("Token: ")?;

    println!(
        "\n{} {}",
        "🔄".bold(),
        "Refresh token (optional - press Enter to skip)".bold().green()
    );
    let refresh = prompt_password("Refresh token: ")?;
    let refresh_token = if refresh.trim().is_empty() {
        println!(
            "{}",
            "⚠ No refresh token - the session cannot renew itself".yellow()
        );
        None
    } else {
        Some(refresh)
    };

    println!("{}", "─".repeat(50).dimmed());
    Ok((base_url, token, refresh_token))
}

/// Subcommands for handling authentication of the DataPool CLI
#[derive(StructOpt, Debug)]
#[structopt(about = "Handle authentication of the DataPool CLI")]
pub enum AuthSubCommand {
    /// Store an authentication profile in the system keyring
    #[structopt(about = "Set an authentication profile")]
    Set {
        #[structopt(short, long, help = "Name of the profile")]
        name: String,

        #[structopt(short, long, help = "URL of the DataPool server")]
        url: Option<String>,

        #[structopt(short, long, help = "Access token for authentication")]
        token: Option<String>,

        #[structopt(short, long, help = "Refresh token for session renewal")]
        refresh_token: Option<String>,
    },
}

impl Matcher for AuthSubCommand {
    fn process(self, _client: &BaseClient) {
        match self {
            AuthSubCommand::Set {
                name,
                url,
                token,
                refresh_token,
            } => {
                let result = set_profile(name, url, token, refresh_token);
                match result {
                    Ok(name) => {
                        println!("{} Profile '{}' stored.", "✓".green().bold(), name)
                    }
                    Err(e) => {
                        super::base::print_error(e.to_string());
                        std::process::exit(exitcode::DATAERR);
                    }
                }
            }
        }
    }
}

fn set_profile(
    name: String,
    url: Option<String>,
    token: Option<String>,
    refresh_token: Option<String>,
) -> Result<String, Box<dyn std::error::Error>> {
    let (url, token, refresh_token) = match (url, token) {
        (Some(url), Some(token)) => (url, token, refresh_token),
        _ => prompt_for_credentials()?,
    };

    let profile = AuthProfile::new(name.clone(), url, token, refresh_token);
    profile.store_in_keyring()?;
    Ok(name)
}
