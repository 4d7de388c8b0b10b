/// Shared RS256 JWT codec
///
/// Hubs sign capability tokens with their private key and every receiving hub
/// verifies them with the issuer's public key. Keys are parsed once by the
/// caller and handed to each function, so a process can hold several verifiers
/// (one per trusted issuer) without any global state.
///
/// ## Security Design
///
/// - **RS256 ONLY**: no symmetric algorithms, preventing algorithm confusion
/// - **Expiry enforced**: `exp` is required and validated on every decode
/// - **Typed claims**: callers pick the claims type, so a token missing a
///   required field is rejected while decoding
///
/// ## Usage
///
/// ```rust,ignore
/// use crypto_core::jwt;
///
/// let key = jwt::decoding_key_from_pem(&public_key_pem)?;
/// let claims: MyClaims = jwt::decode_claims(&token, &key)?;
/// ```
use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};

pub use jsonwebtoken::{DecodingKey, EncodingKey};

// ============================================================================
// Constants
// ============================================================================

/// JWT algorithm - MUST be RS256
const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Clock skew tolerated when checking `exp`, in seconds
const LEEWAY_SECS: u64 = 30;

// ============================================================================
// Key Parsing
// ============================================================================

/// Parse an RSA public key in PEM format for token validation
pub fn decoding_key_from_pem(public_key_pem: &str) -> Result<DecodingKey> {
    DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| anyhow!("Failed to parse RSA public key: {e}"))
}

/// Parse an RSA private key in PEM format for token signing
///
/// Only issuing hubs need this; verifying hubs never see the private key.
pub fn encoding_key_from_pem(private_key_pem: &str) -> Result<EncodingKey> {
    EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| anyhow!("Failed to parse RSA private key: {e}"))
}

// ============================================================================
// Encoding / Decoding
// ============================================================================

/// Sign `claims` with RS256
pub fn encode_claims<C: Serialize>(claims: &C, key: &EncodingKey) -> Result<String> {
    encode(&Header::new(JWT_ALGORITHM), claims, key)
        .map_err(|e| anyhow!("Failed to encode token: {e}"))
}

/// Validate signature and expiry, then deserialize the claims
///
/// ## Errors
///
/// Returns error if:
/// - Token signature is invalid or uses another algorithm
/// - Token is expired or has no `exp`
/// - Claims do not match the shape of `C`
pub fn decode_claims<C: DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<C> {
    let mut validation = Validation::new(JWT_ALGORITHM);
    validation.validate_exp = true;
    validation.leeway = LEEWAY_SECS;
    validation.set_required_spec_claims(&["exp"]);

    decode::<C>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| anyhow!("Token validation failed: {e}"))
}

// ============================================================================
// Tests
// ============================================================================
