//! # Institution Login Tokens
//!
//! An institution login carries a compact JWE (`dir` key management,
//! `A256GCM` content encryption) whose plaintext is an HS256 JWT. The JWE
//! key is the SHA-256 digest of the configured JWE secret. The JWT has a
//! single `data` claim holding the JSON-encoded [`InstitutionPayload`];
//! its expiry is not checked.
//!
//! Compact form: `header.encrypted_key.iv.ciphertext.tag`, each part
//! base64url without padding. With `dir` the encrypted key is empty and
//! the encoded header is the additional authenticated data.

use crate::types::QuireError;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const JWE_ALG: &str = "dir";
const JWE_ENC: &str = "A256GCM";
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

// =============================================================================
// PAYLOAD
// =============================================================================

/// Name fields an institution asserts about the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenUser {
    pub middle_names: String,
    pub family_name: String,
    pub given_name: String,
    pub fullname: String,
    pub suffix: String,
    pub username: String,
}

/// The identity provider block of the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenProvider {
    /// Identity provider URL.
    pub idp: String,
    /// Institution id.
    pub id: String,
    pub user: TokenUser,
}

/// Decoded institution login payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionPayload {
    pub provider: TokenProvider,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
}

fn fail(reason: impl std::fmt::Display) -> QuireError {
    QuireError::AuthenticationFailed(reason.to_string())
}

fn cipher(jwe_secret: &str) -> Result<Aes256Gcm, QuireError> {
    let key = Sha256::digest(jwe_secret.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(fail)
}

// =============================================================================
// SEAL / OPEN
// =============================================================================

/// Produce a login token for `payload`.
///
/// Institutions mint these on their side; the platform only opens them.
/// Used by the CLI and by tests.
pub fn seal_token(
    payload: &InstitutionPayload,
    jwe_secret: &str,
    jwt_secret: &str,
) -> Result<String, QuireError> {
    let data = serde_json::to_string(payload)
        .map_err(|e| QuireError::SerializationError(e.to_string()))?;
    let jwt = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &Claims { data },
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| QuireError::SerializationError(e.to_string()))?;

    let header = serde_json::to_vec(&JweHeader {
        alg: JWE_ALG.to_string(),
        enc: JWE_ENC.to_string(),
    })
    .map_err(|e| QuireError::SerializationError(e.to_string()))?;
    let header = URL_SAFE_NO_PAD.encode(header);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher(jwe_secret)?
        .encrypt(
            &nonce,
            Payload {
                msg: jwt.as_bytes(),
                aad: header.as_bytes(),
            },
        )
        .map_err(|e| QuireError::SerializationError(e.to_string()))?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}..{}.{}.{}",
        header,
        URL_SAFE_NO_PAD.encode(nonce),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag)
    ))
}

/// Decrypt, verify and parse a login token.
///
/// Every failure is reported as [`QuireError::AuthenticationFailed`].
pub fn open_token(
    token: &str,
    jwe_secret: &str,
    jwt_secret: &str,
) -> Result<InstitutionPayload, QuireError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    let [header, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
        return Err(fail("token is not a compact JWE"));
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header).map_err(fail)?;
    let parsed: JweHeader = serde_json::from_slice(&header_bytes).map_err(fail)?;
    if parsed.alg != JWE_ALG || parsed.enc != JWE_ENC {
        return Err(fail(format!(
            "unsupported JWE algorithm {}/{}",
            parsed.alg, parsed.enc
        )));
    }
    if !encrypted_key.is_empty() {
        return Err(fail("direct encryption carries no encrypted key"));
    }

    let iv = URL_SAFE_NO_PAD.decode(iv).map_err(fail)?;
    let tag = URL_SAFE_NO_PAD.decode(tag).map_err(fail)?;
    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(fail("malformed JWE iv or tag"));
    }
    let mut sealed = URL_SAFE_NO_PAD.decode(ciphertext).map_err(fail)?;
    sealed.extend_from_slice(&tag);

    let plaintext = cipher(jwe_secret)?
        .decrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &sealed,
                aad: header.as_bytes(),
            },
        )
        .map_err(|_| fail("JWE decryption failed"))?;
    let jwt = String::from_utf8(plaintext).map_err(fail)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    let claims = jsonwebtoken::decode::<Claims>(
        &jwt,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(fail)?
    .claims;

    serde_json::from_str(&claims.data).map_err(fail)
}

// =============================================================================
// TESTS
// =============================================================================
