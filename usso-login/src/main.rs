mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use usso_login::{FileTokenStore, LoginConfig};

#[derive(Parser)]
#[command(name = "usso-login")]
#[command(about = "Log in to services with Ubuntu SSO discharge macaroons")]
#[command(version)]
pub struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to a service offering the usso_discharge interaction
    Login {
        /// Interaction URL advertised by the service
        url: String,

        /// Ubuntu SSO location shown in the prompt
        #[arg(long)]
        sso_url: Option<String>,

        /// Do not ask for a one-time password
        #[arg(long)]
        no_two_factor: bool,
    },
    /// Discharge a macaroon and print the bound chain as JSON
    Discharge {
        /// Base64 encoded macaroon (V1 or V2)
        macaroon: String,

        /// Do not ask for a one-time password
        #[arg(long)]
        no_two_factor: bool,
    },
    /// Show the SSO token cached by other Ubuntu SSO clients
    ///
    /// Logging in with discharge macaroons does not issue an SSO token, so
    /// this only reads a token file written by another tool.
    Token {
        /// Token file (defaults to the configured path)
        #[arg(short, long)]
        path: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = LoginConfig::load().context("Failed to load config")?;

    match cli.command {
        Commands::Login {
            url,
            sso_url,
            no_two_factor,
        } => {
            if let Some(sso_url) = sso_url {
                config.sso_url = sso_url;
            }
            commands::execute_login(&config, &url, config.two_factor && !no_two_factor).await
        }
        Commands::Discharge {
            macaroon,
            no_two_factor,
        } => {
            let chain = commands::execute_discharge(
                &config,
                &macaroon,
                config.two_factor && !no_two_factor,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&chain)?);
            Ok(())
        }
        Commands::Token { path } => {
            let path = match path {
                Some(path) => path,
                None => config.token_path()?,
            };
            let token = commands::execute_token(&FileTokenStore::new(path))?;
            println!("Token: {}", token.token_name);
            println!("Realm: {}", token.realm);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
