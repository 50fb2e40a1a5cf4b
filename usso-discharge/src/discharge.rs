//! Discharge orchestration
//!
//! Walks the third-party caveats of a macaroon, acquires a discharge for
//! each one and binds it, producing the chain a verifier expects.

use crate::{
    client::Discharger,
    error::{DischargeError, Result},
    macaroon::{Caveat, Macaroon},
    wire::Credentials,
    MAX_DISCHARGES,
};
use std::collections::VecDeque;
use tracing::{debug, info};

impl Discharger {
    /// Discharge every third-party caveat of `root`
    ///
    /// Returns `[root, discharge_1, ...]`. Caveats are discharged one at a
    /// time in declaration order; caveats declared by a discharge are
    /// queued behind those already known. Every discharge is bound to the
    /// root signature. The first failure aborts the whole chain.
    pub async fn discharge_all(
        &self,
        root: &Macaroon,
        credentials: &Credentials,
    ) -> Result<Vec<Macaroon>> {
        let root_signature = *root.signature();
        let mut chain = vec![root.clone()];
        let mut pending: VecDeque<Caveat> = root.third_party_caveats().cloned().collect();

        while let Some(caveat) = pending.pop_front() {
            if chain.len() > MAX_DISCHARGES {
                return Err(DischargeError::Protocol(format!(
                    "too many discharges required (limit {})",
                    MAX_DISCHARGES
                )));
            }

            let location = caveat.location.clone().unwrap_or_default();
            debug!(%location, "discharging caveat");
            let mut discharge = self
                .acquire_discharge(&caveat, credentials)
                .await
                .map_err(|source| DischargeError::DischargeFailed {
                    location,
                    source: Box::new(source),
                })?;

            pending.extend(discharge.third_party_caveats().cloned());
            discharge.bind(&root_signature);
            chain.push(discharge);
        }

        info!(discharges = chain.len() - 1, "macaroon discharged");
        Ok(chain)
    }
}
