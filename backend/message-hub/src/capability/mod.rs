//! Capability token verification
//!
//! A user's home hub signs a single-action token naming the user, the hub the
//! token is meant for, and the counter-party users the holder may act on.
//! This hub checks the token before any business logic runs.

mod claims;

pub use claims::{CapabilityAction, CapabilityClaims};

use crate::error::{ServiceError, ServiceResult};
use crate::models::Identity;
use crypto_core::jwt::{self, DecodingKey};
use std::collections::HashSet;
use tracing::debug;

/// Verified token contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub identity: Identity,
    pub action: CapabilityAction,
    pub scope: HashSet<String>,
}

impl Capability {
    pub fn in_scope(&self, user_id: &str) -> bool {
        self.scope.contains(user_id)
    }

    /// Scope as a sorted list, for stable query parameters and fan-out
    pub fn scope_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.scope.iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Stateless token gate bound to one issuer key and the local hub address
pub struct CapabilityVerifier {
    decoding_key: DecodingKey,
    hub_address: String,
}

impl CapabilityVerifier {
    pub fn new(decoding_key: DecodingKey, hub_address: impl Into<String>) -> Self {
        Self {
            decoding_key,
            hub_address: hub_address.into(),
        }
    }

    pub fn from_pem(public_key_pem: &str, hub_address: impl Into<String>) -> ServiceResult<Self> {
        let key = jwt::decoding_key_from_pem(public_key_pem)
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        Ok(Self::new(key, hub_address))
    }

    pub fn hub_address(&self) -> &str {
        &self.hub_address
    }

    /// Decode `token`, require `expected` action, then bind it to `caller`
    pub fn verify(
        &self,
        token: &str,
        expected: CapabilityAction,
        caller: &Identity,
    ) -> ServiceResult<Capability> {
        let claims: CapabilityClaims = jwt::decode_claims(token, &self.decoding_key)
            .map_err(|e| {
                debug!(error = %e, "capability token rejected");
                ServiceError::InvalidToken("invalid token".to_string())
            })?;

        if claims.scope != expected {
            debug!(
                expected = expected.as_str(),
                actual = claims.scope.as_str(),
                "capability action mismatch"
            );
            return Err(ServiceError::InvalidToken("invalid token".to_string()));
        }

        if claims.id != caller.id {
            return Err(ServiceError::IdentityMismatch(
                "token subject does not match caller".to_string(),
            ));
        }

        if !same_hub_address(&claims.hub, &self.hub_address) {
            return Err(ServiceError::IdentityMismatch(
                "token issued for another hub".to_string(),
            ));
        }

        Ok(Capability {
            identity: Identity::new(claims.id, claims.name),
            action: claims.scope,
            scope: claims.users.into_iter().collect(),
        })
    }
}

fn same_hub_address(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}
