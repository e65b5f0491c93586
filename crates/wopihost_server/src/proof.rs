//! WOPI proof validation.
//!
//! Clients sign every request with `X-WOPI-Proof` (current key) and
//! `X-WOPI-ProofOld` (previous key). The signed data is:
//!
//! - 4 bytes: access token length (big-endian) followed by the token
//! - 4 bytes: URL length followed by the uppercased absolute URL
//! - 4 bytes: the value 8 followed by `X-WOPI-TimeStamp` (8 bytes, big-endian)
//!
//! Real clients sign with RSA keys published in their discovery document.
//! [`SharedSecretProofValidator`] signs the same data with HMAC-SHA256 so
//! hosts and test clients sharing a secret can exercise the full flow.

use crate::error::{WopiError, WopiResult};
use crate::headers;
use crate::request::WopiRequest;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wopihost_core::Clock;

type HmacSha256 = Hmac<Sha256>;

/// .NET ticks (100 ns units since 0001-01-01) at the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Proofs older than this are rejected.
pub const DEFAULT_PROOF_MAX_AGE: Duration = Duration::from_secs(20 * 60);

/// Checks the proof headers of a request.
pub trait ProofValidator: Send + Sync + fmt::Debug {
    /// Returns `ProofRejected` if the request is not authentic.
    fn validate(&self, request: &WopiRequest) -> WopiResult<()>;
}

/// Accepts every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysValid;

impl ProofValidator for AlwaysValid {
    fn validate(&self, _request: &WopiRequest) -> WopiResult<()> {
        Ok(())
    }
}

/// Delegates only when both proof headers are present.
///
/// Requests without proofs (browsers, scripts, health probes) pass through.
#[derive(Debug)]
pub struct RelaxedProofValidator {
    inner: Arc<dyn ProofValidator>,
}

impl RelaxedProofValidator {
    /// Wraps a strict validator.
    pub fn new(inner: Arc<dyn ProofValidator>) -> Self {
        Self { inner }
    }
}

impl ProofValidator for RelaxedProofValidator {
    fn validate(&self, request: &WopiRequest) -> WopiResult<()> {
        let has_proofs = request.header_str(headers::PROOF).is_some()
            && request.header_str(headers::PROOF_OLD).is_some();
        if !has_proofs {
            debug!(file_id = %request.file_id, "no proof headers, skipping validation");
            return Ok(());
        }
        self.inner.validate(request)
    }
}

/// HMAC-SHA256 proofs over the WOPI proof data.
#[derive(Clone)]
pub struct SharedSecretProofValidator {
    secret: Vec<u8>,
    max_age: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SharedSecretProofValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecretProofValidator")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl SharedSecretProofValidator {
    /// Creates a validator for `secret`.
    pub fn new(secret: impl Into<Vec<u8>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            max_age: DEFAULT_PROOF_MAX_AGE,
            clock,
        }
    }

    /// Sets the maximum proof age. Timestamps further ahead of the clock
    /// than this are rejected too.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Signs a request the way a client would, returning the base64 proof.
    ///
    /// # Errors
    ///
    /// Returns `ProofRejected` if the MAC cannot be keyed.
    pub fn sign(&self, access_token: &str, url: &str, ticks: i64) -> WopiResult<String> {
        let mut mac = self.mac()?;
        mac.update(&proof_data(access_token, url, ticks));
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> WopiResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| WopiError::ProofRejected(format!("unusable proof key: {e}")))
    }

    fn verifies(&self, data: &[u8], proof: &str) -> WopiResult<bool> {
        let Ok(signature) = STANDARD.decode(proof.trim()) else {
            return Ok(false);
        };
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.verify_slice(&signature).is_ok())
    }
}

impl ProofValidator for SharedSecretProofValidator {
    fn validate(&self, request: &WopiRequest) -> WopiResult<()> {
        let ticks: i64 = request
            .header_str(headers::TIMESTAMP)
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| WopiError::ProofRejected("missing or invalid timestamp".into()))?;

        let signed_at = from_ticks(ticks)
            .ok_or_else(|| WopiError::ProofRejected("timestamp out of range".into()))?;
        let age = self.clock.now() - signed_at;
        if age.abs().to_std().is_ok_and(|skew| skew > self.max_age) {
            let reason = if age < chrono::Duration::zero() {
                "proof timestamp is in the future"
            } else {
                "proof expired"
            };
            return Err(WopiError::ProofRejected(reason.into()));
        }

        let data = proof_data(request.access_token.as_deref().unwrap_or(""), &request.url, ticks);
        for name in [headers::PROOF, headers::PROOF_OLD] {
            if let Some(proof) = request.header_str(name) {
                if self.verifies(&data, proof)? {
                    return Ok(());
                }
            }
        }
        Err(WopiError::ProofRejected("signature mismatch".into()))
    }
}

/// Builds the byte sequence covered by a WOPI proof.
#[must_use]
pub fn proof_data(access_token: &str, url: &str, ticks: i64) -> Vec<u8> {
    let url = url.to_uppercase();
    let mut data = Vec::with_capacity(4 + access_token.len() + 4 + url.len() + 4 + 8);
    data.extend_from_slice(&(access_token.len() as u32).to_be_bytes());
    data.extend_from_slice(access_token.as_bytes());
    data.extend_from_slice(&(url.len() as u32).to_be_bytes());
    data.extend_from_slice(url.as_bytes());
    data.extend_from_slice(&8u32.to_be_bytes());
    data.extend_from_slice(&ticks.to_be_bytes());
    data
}

/// Converts a time to .NET ticks, the unit of `X-WOPI-TimeStamp`.
#[must_use]
pub fn to_ticks(at: DateTime<Utc>) -> i64 {
    at.timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(at.timestamp_subsec_nanos() / 100))
        .saturating_add(UNIX_EPOCH_TICKS)
}

fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let since_epoch = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = u32::try_from(since_epoch.rem_euclid(TICKS_PER_SECOND) * 100).ok()?;
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Operation;
    use wopihost_core::ManualClock;

    const URL: &str = "https://host/wopi/files/abc?access_token=tok";

    fn signer() -> (SharedSecretProofValidator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (SharedSecretProofValidator::new(b"secret".to_vec(), clock.clone()), clock)
    }

    fn signed_request(validator: &SharedSecretProofValidator, ticks: i64) -> WopiRequest {
        let proof = validator.sign("tok", URL, ticks).unwrap();
        WopiRequest::operation(Operation::CheckFileInfo, "abc")
            .access_token("tok")
            .url(URL)
            .header("X-WOPI-TimeStamp", &ticks.to_string())
            .header("X-WOPI-Proof", &proof)
            .header("X-WOPI-ProofOld", "AAAA")
    }

    #[test]
    fn ticks_round_trip_at_epoch() {
        let epoch = DateTime::<Utc>::default();
        assert_eq!(to_ticks(epoch), UNIX_EPOCH_TICKS);
        assert_eq!(from_ticks(UNIX_EPOCH_TICKS), Some(epoch));
    }

    #[test]
    fn proof_data_layout() {
        let data = proof_data("t", "http://a", 1);
        assert_eq!(&data[0..4], &1u32.to_be_bytes());
        assert_eq!(data[4], b't');
        assert_eq!(&data[5..9], &8u32.to_be_bytes());
        assert_eq!(&data[9..17], b"HTTP://A");
        assert_eq!(&data[17..21], &8u32.to_be_bytes());
        assert_eq!(&data[21..], &1i64.to_be_bytes());
    }

    #[test]
    fn accepts_valid_proof() {
        let (validator, clock) = signer();
        let request = signed_request(&validator, to_ticks(clock.now()));
        validator.validate(&request).unwrap();
    }

    #[test]
    fn accepts_proof_old() {
        let (validator, clock) = signer();
        let ticks = to_ticks(clock.now());
        let proof = validator.sign("tok", URL, ticks).unwrap();
        let request = WopiRequest::operation(Operation::CheckFileInfo, "abc")
            .access_token("tok")
            .url(URL)
            .header("X-WOPI-TimeStamp", &ticks.to_string())
            .header("X-WOPI-Proof", "AAAA")
            .header("X-WOPI-ProofOld", &proof);
        validator.validate(&request).unwrap();
    }

    #[test]
    fn rejects_other_url() {
        let (validator, clock) = signer();
        let request = signed_request(&validator, to_ticks(clock.now())).url("https://evil/");
        assert!(matches!(
            validator.validate(&request),
            Err(WopiError::ProofRejected(_))
        ));
    }

    #[test]
    fn rejects_expired_proof() {
        let (validator, clock) = signer();
        let request = signed_request(&validator, to_ticks(clock.now()));
        clock.advance(Duration::from_secs(21 * 60));
        assert!(validator.validate(&request).is_err());
    }

    #[test]
    fn rejects_proof_from_the_future() {
        let (validator, clock) = signer();
        let ahead = clock.now() + chrono::Duration::minutes(21);
        let request = signed_request(&validator, to_ticks(ahead));
        assert!(validator.validate(&request).is_err());

        let slightly_ahead = clock.now() + chrono::Duration::seconds(30);
        let request = signed_request(&validator, to_ticks(slightly_ahead));
        validator.validate(&request).unwrap();
    }

    #[test]
    fn rejects_missing_timestamp() {
        let (validator, _) = signer();
        let request = WopiRequest::operation(Operation::CheckFileInfo, "abc");
        assert!(validator.validate(&request).is_err());
    }

    #[test]
    fn relaxed_skips_requests_without_proofs() {
        let (validator, _) = signer();
        let relaxed = RelaxedProofValidator::new(Arc::new(validator));
        let request = WopiRequest::operation(Operation::CheckFileInfo, "abc")
            .header("X-WOPI-Proof", "only-one");
        relaxed.validate(&request).unwrap();
    }

    #[test]
    fn relaxed_checks_requests_with_both_proofs() {
        let (validator, clock) = signer();
        let ticks = to_ticks(clock.now());
        let relaxed = RelaxedProofValidator::new(Arc::new(validator));
        let request = WopiRequest::operation(Operation::CheckFileInfo, "abc")
            .url(URL)
            .header("X-WOPI-TimeStamp", &ticks.to_string())
            .header("X-WOPI-Proof", "AAAA")
            .header("X-WOPI-ProofOld", "AAAA");
        assert!(relaxed.validate(&request).is_err());
    }
}
