//! Shared setup for commands that talk to the backend.

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use tracing::debug;

use gabarito_client::{load_config_from, HttpBackend};
use gabarito_core::access::{check, Access, Route};
use gabarito_core::labels::role_label;
use gabarito_core::model::Session;
use gabarito_core::session::SessionStore;

pub struct Context {
    pub backend: HttpBackend,
    pub store: SessionStore,
}

impl Context {
    /// Load config, build the backend and restore the stored session.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = load_config_from(config_path.as_deref())?;
        let backend = config.backend().context("failed to build HTTP client")?;
        let store = SessionStore::hydrate(config.session_storage());
        debug!(base_url = %config.base_url, authenticated = store.is_authenticated(), "context ready");
        Ok(Self { backend, store })
    }

    /// Run the authorization gate for `route`.
    pub fn gate(&self, route: &Route) -> Result<()> {
        let current = self.store.current();
        match check(route, current) {
            Access::Allow => Ok(()),
            Access::Redirect(to) => match current {
                None => bail!("not logged in, redirecting to {to}. Run `gabarito login` first."),
                Some(session) if route.is_public() => bail!(
                    "already logged in as {}, redirecting to {to}. Run `gabarito logout` first.",
                    session.user.email
                ),
                Some(session) => bail!(
                    "{route} is not available to {}, redirecting to {to}",
                    role_label(session.role())
                ),
            },
        }
    }

    /// Run the gate for `route` and return the session it admitted.
    pub fn enter(&self, route: &Route) -> Result<&Session> {
        self.gate(route)?;
        Ok(self.store.require()?)
    }
}
