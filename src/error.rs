//! Error handler for fireadmin.

use jsonwebtoken::Algorithm;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing every failure surfaced by the crate.
///
/// Verification rejections are kept distinguishable so callers can
/// branch on them, e.g. to separate a likely-expired token
/// ([`Error::UnknownKeyId`], [`Error::TokenExpired`]) from a forged one
/// ([`Error::BadSignature`]). Nothing is retried automatically; every
/// failure is returned to the immediate caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Issuance was requested but the application holds no signing
    /// material. A caller configuration error, not a token error.
    #[error("service account needed to create custom tokens")]
    NoServiceAccount,

    #[error("service account private key is not an RSA PEM key: {0}")]
    InvalidPrivateKey(#[source] jsonwebtoken::errors::Error),

    #[error("ID token is malformed: {0}")]
    MalformedToken(#[source] jsonwebtoken::errors::Error),

    #[error("ID token has incorrect algorithm {found:?}, expected RS256, RS384 or RS512")]
    IncorrectAlgorithm { found: Algorithm },

    #[error("ID token has no \"kid\" claim")]
    NoKeyId,

    #[error(
        "ID token has \"kid\" claim {0:?} which does not correspond to a known \
         public key; most likely the ID token is expired, so get a fresh token \
         from your client app and try again"
    )]
    UnknownKeyId(String),

    #[error("ID token signature is invalid")]
    BadSignature,

    #[error("ID token is expired")]
    TokenExpired,

    #[error("ID token has incorrect \"aud\" (audience) claim {0:?}")]
    BadAudience(String),

    #[error("ID token has incorrect \"iss\" (issuer) claim {0:?}")]
    BadIssuer(String),

    #[error("ID token has an empty string \"sub\" (subject) claim")]
    EmptySubject,

    #[error("ID token has \"sub\" (subject) claim longer than 128 characters")]
    SubjectTooLong,

    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// A [`TokenSource`](crate::TokenSource) could not produce a token.
    #[error("failed to obtain an access token: {0}")]
    TokenSource(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Non-2xx database response; carries the server-provided `error`
    /// message when the body has one, the raw status line otherwise.
    #[error("database error: {0}")]
    Database(String),

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The invoked operation has no backing implementation.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),
}
