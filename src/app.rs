//! Application object shared by every service.

use std::sync::Arc;

use jsonwebtoken::EncodingKey;

use crate::auth::Auth;
use crate::database::Database;
use crate::error::{Error, Result};

/// Options to build an [`App`].
pub struct AppOptions {
    /// Firebase project identifier.
    pub project_id: String,
    /// Base URL of the realtime database, e.g.
    /// `https://<project>.firebaseio.com`.
    pub database_url: String,
    /// Signing material; required only to mint custom tokens.
    pub service_account: Option<ServiceAccount>,
    /// Source of bearer tokens attached to database calls.
    pub token_source: Option<Arc<dyn TokenSource>>,
}

/// Signing material of a service account.
///
/// Parsing a credentials file is up to the caller; this type only takes
/// the fields issuance needs.
pub struct ServiceAccount {
    pub(crate) client_email: String,
    pub(crate) private_key_id: Option<String>,
    pub(crate) private_key: EncodingKey,
}

impl ServiceAccount {
    /// Create a [`ServiceAccount`] from an RSA private key in PKCS#1 or
    /// PKCS#8 PEM form.
    ///
    /// `private_key_id` is stamped into the `kid` header of every
    /// issued token, so verifiers can resolve the matching public key.
    pub fn from_rsa_pem(
        client_email: impl Into<String>,
        private_key_id: Option<String>,
        private_key_pem: &[u8],
    ) -> Result<Self> {
        let private_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(Error::InvalidPrivateKey)?;

        Ok(Self {
            client_email: client_email.into(),
            private_key_id,
            private_key,
        })
    }
}

/// Source of bearer tokens for outbound database calls.
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token.
    fn access_token(&self) -> Result<String>;
}

/// [`TokenSource`] handing out one fixed token, e.g. a database secret.
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    /// Create a new [`StaticTokenSource`].
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticTokenSource {
    fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

pub(crate) struct AppInner {
    pub(crate) project_id: String,
    pub(crate) database_url: String,
    pub(crate) service_account: Option<ServiceAccount>,
    pub(crate) token_source: Option<Arc<dyn TokenSource>>,
}

/// Handle on the application configuration. Immutable after
/// construction and shared by reference across all services created
/// from it.
#[derive(Clone)]
pub struct App {
    pub(crate) inner: Arc<AppInner>,
}

impl App {
    /// Create a new [`App`].
    pub fn new(options: AppOptions) -> Self {
        Self {
            inner: Arc::new(AppInner {
                project_id: options.project_id,
                database_url: options
                    .database_url
                    .trim_end_matches('/')
                    .to_owned(),
                service_account: options.service_account,
                token_source: options.token_source,
            }),
        }
    }

    /// Create an [`Auth`] service.
    ///
    /// Each instance owns its own key cache; create one and share it
    /// rather than building one per request.
    pub fn auth(&self) -> Auth {
        Auth::new(self.clone())
    }

    /// Create a [`Database`] client.
    pub fn database(&self) -> Database {
        Database::new(self.clone())
    }
}
