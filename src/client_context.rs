use crate::config::FirebaseConfig;
use crate::domain::identity::driven_ports::IdentityProvider;
use crate::external_connections::HttpConnectivity;
use crate::persistence::firebase_auth::FirebaseIdentity;
use crate::persistence::firestore::FirestoreStore;
use crate::persistence::memory::{InMemoryStore, LocalIdentity};
use tracing::info;

/// Everything the client talks to, built once on startup and handed to whoever needs it
pub struct ClientContext<S, I> {
    pub ext_cxn: HttpConnectivity,
    pub store: S,
    pub identity: I,
}

impl ClientContext<FirestoreStore, FirebaseIdentity> {
    /// Connects to a Firebase project. Firestore requests carry the signed-in user's ID token.
    pub fn init_firebase(config: &FirebaseConfig) -> Result<Self, anyhow::Error> {
        let identity = FirebaseIdentity::new(config);
        let store = FirestoreStore::new(config, identity.token_source());
        info!(project_id = %config.project_id, "Using the Firebase backend");

        Ok(ClientContext {
            ext_cxn: HttpConnectivity::new()?,
            store,
            identity,
        })
    }
}

impl ClientContext<InMemoryStore, LocalIdentity> {
    /// Keeps everything in process. Nothing survives a restart.
    pub fn init_in_memory() -> Result<Self, anyhow::Error> {
        info!("Using the in-memory backend");

        Ok(ClientContext {
            ext_cxn: HttpConnectivity::new()?,
            store: InMemoryStore::new(),
            identity: LocalIdentity::new(),
        })
    }
}

impl<S, I: IdentityProvider> ClientContext<S, I> {
    /// Ends the session of whoever is still signed in and releases the adapters
    pub async fn shutdown(self) -> Result<(), anyhow::Error> {
        if self.identity.session_changes().current_user().is_some() {
            self.identity.sign_out(&self.ext_cxn).await?;
        }

        info!("Client context shut down");
        Ok(())
    }
}
