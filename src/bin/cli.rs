use std::error::Error;
use std::sync::Arc;

use colored::Colorize;
use structopt::StructOpt;
use url::Url;

use datapool::cli::auth::{prompt_for_credentials, AuthProfile, AuthSubCommand};
use datapool::cli::base::{init_logging, Matcher};
use datapool::cli::dataset::DatasetSubCommand;
use datapool::cli::workflow::WorkflowSubCommand;
use datapool::client::BaseClient;
use datapool::token::{IdentityClient, TokenCell, TokenPair};

static HEADER: &str = r#"
--- DataPool Command Line Interface (DPCLI) ---
"#;

/// Identity endpoint below the API base URL used for token refresh.
const IDENTITY_PATH: &str = "auth/token";
const CLIENT_ID: &str = "datapool-cli";

#[derive(StructOpt, Debug)]
struct GlobalOpts {
    /// Profile name to use for configuration
    #[structopt(short, long)]
    profile: Option<String>,
}

#[derive(StructOpt, Debug)]
#[structopt(about = "CLI to interact with a DataPool instance")]
#[allow(clippy::upper_case_acronyms)]
struct CLI {
    #[structopt(flatten)]
    global: GlobalOpts,

    #[structopt(subcommand)]
    cmd: DPCLI,
}

#[derive(StructOpt, Debug)]
#[allow(clippy::upper_case_acronyms)]
enum DPCLI {
    Dataset(DatasetSubCommand),
    Workflow(WorkflowSubCommand),
    Auth(AuthSubCommand),
}

fn main() {
    init_logging();
    let cli = CLI::from_args();

    // The Auth command only touches the keyring and needs no server.
    if let DPCLI::Auth(cmd) = cli.cmd {
        let client = BaseClient::new("https://none", None, TokenCell::fixed(""))
            .expect("Failed to create placeholder client");
        cmd.process(&client);
        return;
    }

    let client = match cli.global.profile {
        Some(profile) => {
            setup_client_from_keyring(&profile).expect("Failed to set up client.")
        }
        None => match setup_client_from_env() {
            Ok(client) => client,
            Err(_) => setup_client_from_input().expect("Failed to set up client."),
        },
    };

    if atty::is(atty::Stream::Stdout) {
        println!("{}", HEADER.bold());
    }

    match cli.cmd {
        DPCLI::Dataset(command) => command.process(&client),
        DPCLI::Workflow(command) => command.process(&client),
        DPCLI::Auth(command) => command.process(&client),
    }
}

/// Build the shared credential cell. With a refresh token the session can
/// renew itself against the identity endpoint; without one the access token
/// is used as-is until it expires.
fn make_token_cell(
    base_url: &str,
    token: String,
    refresh_token: Option<String>,
) -> Result<TokenCell, Box<dyn Error>> {
    Ok(match refresh_token {
        Some(refresh_token) => {
            let identity_url = Url::parse(base_url)?.join(IDENTITY_PATH)?;
            TokenCell::new(
                TokenPair::new(token, refresh_token),
                Arc::new(IdentityClient::new(identity_url, CLIENT_ID)),
            )
        }
        None => TokenCell::fixed(token),
    })
}

fn setup_client_from_keyring(name: &str) -> Result<BaseClient, Box<dyn Error>> {
    let profile = AuthProfile::get_from_keyring(name)?;
    let token = make_token_cell(
        profile.url(),
        profile.token().to_string(),
        profile.refresh_token().map(str::to_string),
    )?;

    BaseClient::new(profile.url(), zone_from_env(), token).map_err(Into::into)
}

// This function extracts the connection from the environment variables
// DPCLI_URL, DPCLI_TOKEN and (optionally) DPCLI_REFRESH_TOKEN.
fn setup_client_from_env() -> Result<BaseClient, Box<dyn Error>> {
    let base_url = std::env::var("DPCLI_URL")
        .map_err(|_| "DPCLI_URL is not set")?;
    let token = std::env::var("DPCLI_TOKEN")
        .map_err(|_| "DPCLI_TOKEN is not set")?;
    let refresh_token = std::env::var("DPCLI_REFRESH_TOKEN").ok();

    let cell = make_token_cell(&base_url, token, refresh_token)?;
    BaseClient::new(&base_url, zone_from_env(), cell).map_err(Into::into)
}

fn setup_client_from_input() -> Result<BaseClient, Box<dyn Error>> {
    let (base_url, token, refresh_token) = prompt_for_credentials()?;
    let cell = make_token_cell(&base_url, token, refresh_token)?;
    BaseClient::new(&base_url, zone_from_env(), cell).map_err(Into::into)
}

fn zone_from_env() -> Option<String> {
    std::env::var("DPCLI_ZONE").ok()
}
