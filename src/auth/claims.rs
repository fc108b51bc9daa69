//! Pieces of information asserted on an identity token.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Audience the identity-toolkit service assigns to self-issued custom
/// tokens.
pub const FIREBASE_AUDIENCE: &str = "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Registered claims of an identity token, plus whatever custom claims
/// the issuing application attached.
///
/// Built fresh for issuance, reconstructed by parsing for verification,
/// and discarded after use; nothing caches a [`Claims`] value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Organization or account that issued the token.
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    /// Principal the token makes claims about. Equal to
    /// [`Claims::user_id`] after successful verification.
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    /// Recipient the token is intended for.
    #[serde(rename = "aud", default, skip_serializing_if = "String::is_empty")]
    pub audience: String,
    /// Identifies the time (unix seconds) at which the token was issued.
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    /// Identifies the expiration time (unix seconds) on or after which
    /// the token must not be accepted.
    #[serde(rename = "exp", default)]
    pub expires_at: i64,
    /// Authenticated user id.
    #[serde(rename = "user_id", default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    /// Developer-supplied claims, nested under the `claims` key.
    #[serde(rename = "claims", default, skip_serializing_if = "Map::is_empty")]
    pub custom: Map<String, Value>,
}

impl Claims {
    /// Whether `aud` names `expected` or the fixed custom-token
    /// audience ([`FIREBASE_AUDIENCE`]).
    pub fn verify_audience(&self, expected: &str) -> bool {
        self.audience == expected || self.audience == FIREBASE_AUDIENCE
    }

    /// Whether `iss` names `expected`.
    pub fn verify_issuer(&self, expected: &str) -> bool {
        self.issuer == expected
    }
}
