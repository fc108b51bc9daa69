//! REST client for the hierarchical realtime database.

pub mod reference;

use crate::App;
use crate::database::reference::Reference;

/// Handle on the remote database. Cheap to clone; every [`Reference`]
/// created from it shares the underlying HTTP client.
#[derive(Clone)]
pub struct Database {
    pub(crate) app: App,
    pub(crate) client: reqwest::blocking::Client,
}

impl Database {
    pub(crate) fn new(app: App) -> Self {
        Self {
            app,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// [`Reference`] to the node at `path`.
    pub fn reference(&self, path: &str) -> Reference {
        Reference::new(self.clone(), path)
    }

    /// [`Reference`] to the database root.
    pub fn root(&self) -> Reference {
        Reference::new(self.clone(), "")
    }
}
