//! Verification and issuance of identity tokens.

pub mod claims;
mod keys;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, encode};
use serde_json::{Map, Value};

use crate::App;
use crate::auth::claims::{Claims, FIREBASE_AUDIENCE};
use crate::auth::keys::KeyCache;
use crate::error::{Error, Result};

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const CUSTOM_TOKEN_LIFETIME: i64 = 3600; // 1 hour.
const MAX_SUBJECT_LENGTH: usize = 128;

/// Identity-token service.
///
/// Verifies incoming ID tokens against the platform's rotating public
/// keys and mints custom tokens from the application's service account.
/// Every instance owns its own [`KeyCache`], so create one per
/// application and share it.
pub struct Auth {
    app: App,
    keys: KeyCache,
}

impl Auth {
    pub(crate) fn new(app: App) -> Self {
        Self {
            app,
            keys: KeyCache::new(),
        }
    }

    /// Verify a signed ID token and return its validated claims.
    ///
    /// Checks run cheapest and most security-critical first: token
    /// structure, signing algorithm family, key resolution, signature,
    /// then the audience/issuer/subject claims. All checks are
    /// unconditional; the first failing one is returned.
    pub fn verify_id_token(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).map_err(Error::MalformedToken)?;
        if !matches!(
            header.alg,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
        ) {
            return Err(Error::IncorrectAlgorithm { found: header.alg });
        }

        let kid = match header.kid {
            Some(kid) if !kid.is_empty() => kid,
            _ => return Err(Error::NoKeyId),
        };
        let key = self
            .keys
            .get(&kid)
            .ok_or_else(|| Error::UnknownKeyId(kid))?;

        let mut validation = Validation::new(header.alg);
        // Audience and issuer are compared below, where self-issued
        // custom tokens are also accepted.
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &key, &validation).map_err(|err| {
            if matches!(err.kind(), ErrorKind::InvalidSignature) {
                Error::BadSignature
            } else if matches!(err.kind(), ErrorKind::ExpiredSignature) {
                Error::TokenExpired
            } else {
                Error::MalformedToken(err)
            }
        })?;
        let mut claims = data.claims;

        if !claims.verify_audience(&self.app.inner.project_id) {
            return Err(Error::BadAudience(claims.audience));
        }

        let issuer = format!("{ISSUER_PREFIX}{}", self.app.inner.project_id);
        let self_issued = self
            .app
            .inner
            .service_account
            .as_ref()
            .is_some_and(|account| claims.verify_issuer(&account.client_email));
        if !claims.verify_issuer(&issuer) && !self_issued {
            return Err(Error::BadIssuer(claims.issuer));
        }

        if claims.subject.is_empty() {
            return Err(Error::EmptySubject);
        }
        if claims.subject.len() > MAX_SUBJECT_LENGTH {
            return Err(Error::SubjectTooLong);
        }

        claims.user_id = claims.subject.clone();
        Ok(claims)
    }

    /// Mint a signed custom token for `user_id`, carrying `custom`
    /// unchanged. Tokens live for one hour.
    ///
    /// Requires the application to hold a service account; fails with
    /// [`Error::NoServiceAccount`] otherwise.
    pub fn create_custom_token(
        &self,
        user_id: &str,
        custom: Map<String, Value>,
    ) -> Result<String> {
        let Some(account) = &self.app.inner.service_account else {
            return Err(Error::NoServiceAccount);
        };

        let now = Utc::now().timestamp();
        let claims = Claims {
            issuer: account.client_email.clone(),
            subject: user_id.to_owned(),
            audience: FIREBASE_AUDIENCE.to_owned(),
            issued_at: now,
            expires_at: now + CUSTOM_TOKEN_LIFETIME,
            user_id: user_id.to_owned(),
            custom,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = account.private_key_id.clone();
        encode(&header, &claims, &account.private_key).map_err(Error::Signing)
    }
}
