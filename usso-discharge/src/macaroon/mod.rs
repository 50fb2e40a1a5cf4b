//! Macaroon primitive
//!
//! HMAC-SHA256 chained bearer tokens with first- and third-party caveats,
//! following the libmacaroons signature scheme:
//!
//! ```text
//! sig_0 = HMAC(derive(root_key), id)
//! sig_n = HMAC(sig_n-1, condition)                         (first party)
//! sig_n = HMAC(sig_n-1, HMAC(sig_n-1, vid) || HMAC(sig_n-1, cid))   (third party)
//! ```
//!
//! Discharge macaroons are bound to the signature of the macaroon they are
//! presented with before being sent, see [`Macaroon::bind`].

mod encoding;

pub use encoding::{DischargeMacaroon, Format};

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use ring::hmac;
use subtle::ConstantTimeEq;

/// Length of a macaroon signature in bytes
pub const SIGNATURE_LEN: usize = 32;

/// Length of the nonce prefixed to third-party verification ids
const NONCE_LEN: usize = 24;

/// HMAC key used to derive macaroon keys from caller supplied root keys
const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

/// Nesting limit when verifying discharge chains
const MAX_VERIFY_DEPTH: usize = 32;

/// Raw macaroon signature
pub type Signature = [u8; SIGNATURE_LEN];

/// Macaroon construction, encoding and verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacaroonError {
    /// Wire data could not be decoded
    #[error("cannot decode macaroon: {0}")]
    Decode(String),

    /// Macaroon cannot be represented in the requested format
    #[error("cannot encode macaroon: {0}")]
    Encode(String),

    /// Signature or caveat verification failed
    #[error("macaroon verification failed: {0}")]
    Verification(String),

    /// Encryption of a third-party caveat key failed
    #[error("cryptographic error: {0}")]
    Crypto(String),
}

/// A caveat attached to a macaroon
///
/// First-party caveats carry only a condition in `id`. Third-party caveats
/// also carry the encrypted caveat key and the location of the authority
/// able to discharge them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caveat {
    /// Condition (first party) or opaque caveat identifier (third party)
    pub id: Vec<u8>,

    /// Caveat root key encrypted with the signature at the point of addition
    pub verification_id: Option<Vec<u8>>,

    /// Discharge authority location
    pub location: Option<String>,
}

impl Caveat {
    /// Returns true if this caveat must be discharged by another party
    pub fn is_third_party(&self) -> bool {
        self.verification_id.is_some()
    }
}

/// A macaroon
///
/// Equality compares location, identifier, caveats and signature. The wire
/// format a macaroon was decoded from does not take part, so a legacy V1
/// macaroon equals the same macaroon minted for V2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    location: Option<String>,
    id: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: Signature,
}

impl Macaroon {
    /// Mint a new macaroon from a root key
    pub fn new(root_key: &[u8], id: impl Into<Vec<u8>>, location: impl Into<String>) -> Self {
        let id = id.into();
        let location = location.into();
        let signature = keyed_hash(&derive_key(root_key), &id);
        Self {
            location: (!location.is_empty()).then_some(location),
            id,
            caveats: Vec::new(),
            signature,
        }
    }

    pub(crate) fn from_parts(
        location: Option<String>,
        id: Vec<u8>,
        caveats: Vec<Caveat>,
        signature: Signature,
    ) -> Self {
        Self {
            location: location.filter(|l| !l.is_empty()),
            id,
            caveats,
            signature,
        }
    }

    /// Macaroon identifier
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Location hint of the target service
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Current signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// All caveats in declaration order
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// Third-party caveats in declaration order
    pub fn third_party_caveats(&self) -> impl Iterator<Item = &Caveat> {
        self.caveats.iter().filter(|c| c.is_third_party())
    }

    /// Add a first-party caveat checked by the target service
    pub fn add_first_party_caveat(&mut self, condition: impl Into<Vec<u8>>) {
        let condition = condition.into();
        self.signature = keyed_hash(&self.signature, &condition);
        self.caveats.push(Caveat {
            id: condition,
            verification_id: None,
            location: None,
        });
    }

    /// Add a third-party caveat
    ///
    /// `caveat_root_key` must be shared with the authority at `location`,
    /// which mints the discharge macaroon with it.
    pub fn add_third_party_caveat(
        &mut self,
        caveat_root_key: &[u8],
        caveat_id: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Result<(), MacaroonError> {
        let caveat_id = caveat_id.into();
        let verification_id = encrypt(&self.signature, &derive_key(caveat_root_key))?;
        self.signature = keyed_hash2(&self.signature, &verification_id, &caveat_id);
        self.caveats.push(Caveat {
            id: caveat_id,
            verification_id: Some(verification_id),
            location: Some(location.into()),
        });
        Ok(())
    }

    /// Bind this discharge macaroon to the macaroon it is presented with
    pub fn bind(&mut self, root_signature: &Signature) {
        self.signature = bind_for_request(root_signature, &self.signature);
    }

    /// Verify this macaroon and the discharges presented alongside it
    ///
    /// `check` decides first-party conditions. Every discharge must be
    /// bound to this macaroon and used exactly once.
    pub fn verify<F>(
        &self,
        root_key: &[u8],
        discharges: &[Macaroon],
        check: F,
    ) -> Result<(), MacaroonError>
    where
        F: Fn(&[u8]) -> Result<(), String>,
    {
        let mut used = vec![false; discharges.len()];
        self.verify_chain(
            &self.signature,
            &derive_key(root_key),
            discharges,
            &mut used,
            &check,
            0,
        )?;

        if let Some(unused) = used.iter().position(|u| !u) {
            return Err(MacaroonError::Verification(format!(
                "discharge macaroon {:?} was not used",
                String::from_utf8_lossy(&discharges[unused].id)
            )));
        }
        Ok(())
    }

    fn verify_chain<F>(
        &self,
        root_signature: &Signature,
        key: &Signature,
        discharges: &[Macaroon],
        used: &mut [bool],
        check: &F,
        depth: usize,
    ) -> Result<(), MacaroonError>
    where
        F: Fn(&[u8]) -> Result<(), String>,
    {
        if depth > MAX_VERIFY_DEPTH {
            return Err(MacaroonError::Verification(
                "discharge chain too deep".to_string(),
            ));
        }

        let mut signature = keyed_hash(key, &self.id);
        for caveat in &self.caveats {
            match &caveat.verification_id {
                None => {
                    check(&caveat.id).map_err(|reason| {
                        MacaroonError::Verification(format!(
                            "caveat {:?} not satisfied: {}",
                            String::from_utf8_lossy(&caveat.id),
                            reason
                        ))
                    })?;
                    signature = keyed_hash(&signature, &caveat.id);
                }
                Some(verification_id) => {
                    let caveat_key = decrypt(&signature, verification_id)?;
                    let index = discharges
                        .iter()
                        .enumerate()
                        .position(|(i, d)| !used[i] && d.id == caveat.id)
                        .ok_or_else(|| {
                            MacaroonError::Verification(format!(
                                "cannot find discharge macaroon for caveat {:?}",
                                String::from_utf8_lossy(&caveat.id)
                            ))
                        })?;
                    used[index] = true;
                    discharges[index].verify_chain(
                        root_signature,
                        &caveat_key,
                        discharges,
                        used,
                        check,
                        depth + 1,
                    )?;
                    signature = keyed_hash2(&signature, verification_id, &caveat.id);
                }
            }
        }

        let expected = if depth == 0 {
            signature
        } else {
            bind_for_request(root_signature, &signature)
        };
        if bool::from(expected[..].ct_eq(&self.signature[..])) {
            Ok(())
        } else {
            Err(MacaroonError::Verification(format!(
                "signature mismatch on macaroon {:?}",
                String::from_utf8_lossy(&self.id)
            )))
        }
    }
}

/// Binding of a discharge signature to the signature of the root macaroon
pub fn bind_for_request(root_signature: &Signature, discharge_signature: &Signature) -> Signature {
    if root_signature == discharge_signature {
        return *root_signature;
    }
    keyed_hash2(&[0u8; SIGNATURE_LEN], root_signature, discharge_signature)
}

fn derive_key(root_key: &[u8]) -> Signature {
    keyed_hash(KEY_GENERATOR, root_key)
}

fn keyed_hash(key: &[u8], data: &[u8]) -> Signature {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, data);
    let mut out = [0u8; SIGNATURE_LEN];
    out.copy_from_slice(tag.as_ref());
    out
}

fn keyed_hash2(key: &[u8], first: &[u8], second: &[u8]) -> Signature {
    let mut data = [0u8; SIGNATURE_LEN * 2];
    data[..SIGNATURE_LEN].copy_from_slice(&keyed_hash(key, first));
    data[SIGNATURE_LEN..].copy_from_slice(&keyed_hash(key, second));
    keyed_hash(key, &data)
}

fn encrypt(key: &Signature, plaintext: &Signature) -> Result<Vec<u8>, MacaroonError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), &plaintext[..])
        .map_err(|e| MacaroonError::Crypto(format!("cannot encrypt caveat key: {}", e)))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn decrypt(key: &Signature, verification_id: &[u8]) -> Result<Signature, MacaroonError> {
    if verification_id.len() <= NONCE_LEN {
        return Err(MacaroonError::Verification(
            "verification id too short".to_string(),
        ));
    }
    let (nonce, sealed) = verification_id.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), sealed)
        .map_err(|_| {
            MacaroonError::Verification("cannot decrypt third party caveat key".to_string())
        })?;

    plaintext.try_into().map_err(|_| {
        MacaroonError::Verification("third party caveat key has wrong length".to_string())
    })
}
