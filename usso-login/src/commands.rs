//! CLI command implementations

use anyhow::{Context, Result};
use std::{collections::HashMap, io::IsTerminal};
use tracing::info;
use url::Url;
use usso_discharge::{
    Credentials, Discharger, Macaroon, SsoDischargeStrategy, UssoVisitor, Visitor, PROTOCOL_NAME,
};
use usso_login::{
    read_usso_params, HiddenPassword, LinePassword, LoginConfig, SsoData, TokenStore,
};

/// Prompt for credentials on the terminal
///
/// The password is entered without echo when stdin is a terminal.
fn prompt_credentials(config: &LoginConfig, two_factor: bool) -> Result<Credentials> {
    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    let mut input = stdin.lock();
    let mut output = std::io::stderr();
    let credentials = if interactive {
        read_usso_params(
            &mut input,
            &mut output,
            &mut HiddenPassword,
            &config.sso_url,
            two_factor,
        )
    } else {
        read_usso_params(
            &mut input,
            &mut output,
            &mut LinePassword,
            &config.sso_url,
            two_factor,
        )
    };
    credentials.context("Failed to read credentials")
}

/// Log in to the service at `url` through the usso_discharge interaction
pub async fn execute_login(config: &LoginConfig, url: &str, two_factor: bool) -> Result<()> {
    let url = Url::parse(url).with_context(|| format!("Invalid login URL {}", url))?;
    let credentials = prompt_credentials(config, two_factor)?;

    let visitor = UssoVisitor::new(SsoDischargeStrategy::new(credentials));
    let methods = HashMap::from([(PROTOCOL_NAME.to_string(), url.clone())]);
    visitor
        .visit_web_page(&reqwest::Client::new(), &methods)
        .await?;

    info!(%url, "logged in");
    Ok(())
}

/// Discharge a base64 encoded macaroon
pub async fn execute_discharge(
    config: &LoginConfig,
    macaroon: &str,
    two_factor: bool,
) -> Result<Vec<Macaroon>> {
    let macaroon = Macaroon::from_base64(macaroon).context("Invalid macaroon")?;
    let credentials = prompt_credentials(config, two_factor)?;

    let chain = Discharger::new()
        .discharge_all(&macaroon, &credentials)
        .await?;
    info!(discharges = chain.len() - 1, "discharged");
    Ok(chain)
}

/// Read the cached token
pub fn execute_token(store: &dyn TokenStore) -> Result<SsoData> {
    Ok(store.read_token()?)
}
