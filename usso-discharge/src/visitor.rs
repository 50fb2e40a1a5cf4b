//! Interaction visitor for the `usso_discharge` protocol
//!
//! An authority that needs the user to log in offers a map from protocol
//! name to URL. [`UssoVisitor`] handles the entry for this protocol by
//! running a [`DischargeStrategy`] and posting the resulting macaroons back
//! to the same URL. Any other offer is declined with
//! [`DischargeError::MethodNotSupported`] so an outer visitor can try
//! another protocol.

use crate::{
    client::{fetch_macaroon, login, Discharger},
    error::{DischargeError, Result},
    macaroon::Macaroon,
    wire::Credentials,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Protocol name advertised by authorities supporting direct discharge
pub const PROTOCOL_NAME: &str = "usso_discharge";

/// Handles an interaction request from an authority
#[async_trait]
pub trait Visitor: Send + Sync {
    /// Perform the interaction using one of the offered protocols
    async fn visit_web_page(
        &self,
        client: &reqwest::Client,
        methods: &HashMap<String, Url>,
    ) -> Result<()>;
}

/// Obtains a discharged macaroon chain for a login URL
#[async_trait]
pub trait DischargeStrategy: Send + Sync {
    /// Produce the macaroons to log in with at `url`
    async fn discharge(&self, client: &reqwest::Client, url: &str) -> Result<Vec<Macaroon>>;
}

/// Visitor for the `usso_discharge` protocol
pub struct UssoVisitor<S> {
    strategy: S,
}

impl<S: DischargeStrategy> UssoVisitor<S> {
    /// Create a visitor delegating to `strategy`
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    /// The configured strategy
    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

#[async_trait]
impl<S: DischargeStrategy> Visitor for UssoVisitor<S> {
    async fn visit_web_page(
        &self,
        client: &reqwest::Client,
        methods: &HashMap<String, Url>,
    ) -> Result<()> {
        let Some(url) = methods.get(PROTOCOL_NAME) else {
            debug!(offered = ?methods.keys().collect::<Vec<_>>(), "usso_discharge not offered");
            return Err(DischargeError::MethodNotSupported);
        };

        let macaroons = self.strategy.discharge(client, url.as_str()).await?;
        login(client, url.as_str(), &macaroons).await
    }
}

/// Strategy logging in with Ubuntu SSO credentials
///
/// Fetches the bootstrap macaroon from the login URL and discharges it.
#[derive(Debug, Clone)]
pub struct SsoDischargeStrategy {
    credentials: Credentials,
}

impl SsoDischargeStrategy {
    /// Create a strategy submitting `credentials`
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl DischargeStrategy for SsoDischargeStrategy {
    async fn discharge(&self, client: &reqwest::Client, url: &str) -> Result<Vec<Macaroon>> {
        let macaroon = fetch_macaroon(client, url).await?;
        Discharger::with_client(client.clone())
            .discharge_all(&macaroon, &self.credentials)
            .await
    }
}
