//! Fireadmin is a server-side Firebase client: it verifies and mints
//! identity tokens and reads/writes the realtime database over REST.
//!
//! Everything starts from an [`App`] built out of [`AppOptions`]; the
//! services it creates ([`App::auth`], [`App::database`]) all share the
//! same configuration by reference.

#![forbid(unsafe_code)]

mod app;
pub mod auth;
pub mod database;
pub mod error;

pub use app::{App, AppOptions, ServiceAccount, StaticTokenSource, TokenSource};
pub use auth::Auth;
pub use auth::claims::Claims;
pub use database::Database;
pub use database::reference::{Reference, Snapshot};
pub use error::{Error, Result};

/// Throwaway RSA keypair as (private PEM, public PEM), generated once
/// and shared between test modules. MUST NEVER be used in production.
#[cfg(test)]
pub(crate) fn test_rsa_keypair() -> &'static (String, String) {
    use std::sync::OnceLock;

    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::{RsaPrivateKey, RsaPublicKey};

    static KEYPAIR: OnceLock<(String, String)> = OnceLock::new();
    KEYPAIR.get_or_init(|| {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048)
            .expect("cannot generate RSA key");
        let private = key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("cannot encode private key")
            .to_string();
        let public = RsaPublicKey::from(&key)
            .to_public_key_pem(LineEnding::LF)
            .expect("cannot encode public key");
        (private, public)
    })
}
