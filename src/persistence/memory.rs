use crate::domain::identity::driven_ports::IdentityProvider;
use crate::domain::identity::{Credentials, SessionBroadcaster, SessionListener, SignInError, UserId};
use crate::domain::store::driven_ports::DocumentStore;
use crate::domain::store::{FieldFilter, Fields, OrderBy, StoredDocument, evaluate_query};
use crate::external_connections::ExternalConnectivity;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Document store that lives only as long as the process. Used by the "memory" backend.
pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Vec<StoredDocument>>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore {
            collections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn collections(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<StoredDocument>>>, anyhow::Error> {
        self.collections
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryStore {
    async fn insert(
        &self,
        collection: &str,
        fields: Fields,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<String, anyhow::Error> {
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.collections()?
            .entry(collection.to_owned())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                fields,
            });

        debug!(%id, collection, "Stored document in memory");
        Ok(id)
    }

    async fn partial_update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        let mut collections = self.collections()?;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| anyhow!("no document {id} in {collection}"))?;

        document.fields.extend(fields);
        Ok(())
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        if let Some(documents) = self.collections()?.get_mut(collection) {
            documents.retain(|doc| doc.id != id);
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
        order_by: &OrderBy,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<StoredDocument>, anyhow::Error> {
        let collections = self.collections()?;
        let documents = collections
            .get(collection)
            .map(|documents| evaluate_query(documents, filter, order_by))
            .unwrap_or_default();

        Ok(documents)
    }
}

/// Identity provider that trusts whatever name it is given. Used by the "memory" backend.
pub struct LocalIdentity {
    broadcaster: SessionBroadcaster,
}

impl LocalIdentity {
    pub fn new() -> LocalIdentity {
        LocalIdentity {
            broadcaster: SessionBroadcaster::new(),
        }
    }
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for LocalIdentity {
    async fn sign_in(
        &self,
        credentials: &Credentials,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<UserId, SignInError> {
        let user_id =
            UserId::new(credentials.principal.trim()).ok_or(SignInError::Cancelled)?;

        info!("Signed in locally as {user_id}");
        self.broadcaster.publish(Some(user_id.clone()));
        Ok(user_id)
    }

    async fn sign_out(&self, _ext_cxn: &impl ExternalConnectivity) -> Result<(), anyhow::Error> {
        info!("Signed out");
        self.broadcaster.publish(None);
        Ok(())
    }

    fn session_changes(&self) -> SessionListener {
        self.broadcaster.subscribe()
    }
}
