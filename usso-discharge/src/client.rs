//! Discharge protocol client
//!
//! HTTP exchanges with the Ubuntu SSO discharge authority: fetching the
//! bootstrap macaroon, acquiring a discharge for a caveat and posting the
//! discharged chain to the login endpoint.

use crate::{
    error::{DischargeError, Result},
    macaroon::{Caveat, Macaroon},
    wire::{
        Credentials, DischargeRequest, DischargeResponse, ErrorResponse, LoginParams,
        LoginRequest, MacaroonResponse,
    },
};
use reqwest::{header::ACCEPT, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Path of the discharge endpoint relative to the caveat location
pub const DISCHARGE_PATH: &str = "/api/v2/tokens/discharge";

const JSON: &str = "application/json";

/// Client acquiring discharges from Ubuntu SSO
#[derive(Clone, Debug, Default)]
pub struct Discharger {
    client: reqwest::Client,
}

impl Discharger {
    /// Create a discharger with a default HTTP client
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create a discharger sharing an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Underlying HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Acquire a discharge macaroon for a third-party caveat
    ///
    /// Any non-200 answer carrying a structured error body fails with
    /// [`DischargeError::CredentialsRejected`] holding the authority's
    /// message verbatim.
    pub async fn acquire_discharge(
        &self,
        caveat: &Caveat,
        credentials: &Credentials,
    ) -> Result<Macaroon> {
        let location = caveat.location.as_deref().ok_or_else(|| {
            DischargeError::Protocol("third party caveat has no location".to_string())
        })?;
        let url = discharge_url(location);

        debug!(%url, email = %credentials.email, "requesting discharge");
        let response = self
            .client
            .post(&url)
            .header(ACCEPT, JSON)
            .json(&DischargeRequest::new(caveat, credentials))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let error = read_error(response).await?;
            warn!(%url, %status, code = %error.code, "discharge refused");
            return Err(DischargeError::CredentialsRejected {
                message: error.message,
                code: error.code,
            });
        }

        let body: DischargeResponse = read_json(response, "discharge response").await?;
        debug!(%url, "discharge acquired");
        Ok(body.discharge_macaroon.into_inner())
    }
}

/// Fetch the bootstrap macaroon that starts a login
///
/// Authority and decoding failures are reported as
/// `cannot get macaroon: <detail>`; transport failures pass through.
pub async fn fetch_macaroon(client: &reqwest::Client, url: &str) -> Result<Macaroon> {
    debug!(%url, "fetching macaroon");
    fetch_macaroon_response(client, url)
        .await
        .map(|r| r.macaroon)
        .map_err(|e| match e {
            DischargeError::Transport(_) => e,
            other => other.context("cannot get macaroon"),
        })
}

async fn fetch_macaroon_response(client: &reqwest::Client, url: &str) -> Result<MacaroonResponse> {
    let response = client.get(url).header(ACCEPT, JSON).send().await?;
    if !response.status().is_success() {
        let error = read_error(response).await?;
        return Err(DischargeError::Remote {
            message: error.message,
            code: error.code,
        });
    }
    read_json(response, "macaroon response").await
}

/// Submit a discharged macaroon chain to the login endpoint
pub async fn login(client: &reqwest::Client, url: &str, macaroons: &[Macaroon]) -> Result<()> {
    debug!(%url, count = macaroons.len(), "posting login macaroons");
    let request = LoginRequest {
        login: LoginParams {
            macaroons: macaroons.to_vec(),
        },
    };
    let response = client
        .post(url)
        .header(ACCEPT, JSON)
        .json(&request)
        .send()
        .await?;

    if response.status() != StatusCode::OK {
        let error = read_error(response).await?;
        return Err(DischargeError::Remote {
            message: error.message,
            code: error.code,
        }
        .context("cannot log in"));
    }
    Ok(())
}

fn discharge_url(location: &str) -> String {
    format!("{}{}", location.trim_end_matches('/'), DISCHARGE_PATH)
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| DischargeError::Protocol(format!("cannot unmarshal {}: {}", what, e)))
}

async fn read_error(response: Response) -> Result<ErrorResponse> {
    let status = response.status();
    let body = response.bytes().await?;
    let error: ErrorResponse = serde_json::from_slice(&body).map_err(|e| {
        DischargeError::Protocol(format!(
            "unexpected response status {}: cannot unmarshal error: {}",
            status, e
        ))
    })?;
    if error.message.is_empty() {
        return Err(DischargeError::Protocol(format!(
            "unexpected response status {} with no error message",
            status
        )));
    }
    Ok(error)
}
