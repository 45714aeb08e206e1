use crate::external_connections::ExternalConnectivity;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Opaque identifier of an authenticated user, as assigned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Returns [None] for blank identifiers, which never name a real user
    pub fn new(id: impl Into<String>) -> Option<UserId> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(UserId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What the user typed into the sign-in prompt. A blank principal means the prompt was dismissed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub principal: String,
    pub secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("principal", &self.principal)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn is_dismissed(&self) -> bool {
        self.principal.trim().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SignInError {
    #[error("sign-in was cancelled")]
    Cancelled,
    #[error("the identity provider rejected the sign-in: {0}")]
    Rejected(String),
    #[error(transparent)]
    PortError(#[from] anyhow::Error),
}

pub mod driven_ports {
    use super::*;

    pub trait IdentityProvider {
        /// Authenticates interactively. On success the session channel publishes the new user.
        async fn sign_in(
            &self,
            credentials: &Credentials,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<UserId, SignInError>;

        /// Ends the current session. The session channel publishes "no user".
        async fn sign_out(&self, ext_cxn: &impl ExternalConnectivity) -> Result<(), anyhow::Error>;

        /// Registers a listener for sign-in/sign-out transitions. The listener stays registered
        /// until the returned handle is dropped.
        fn session_changes(&self) -> SessionListener;
    }
}

/// Owning side of an identity provider's session channel
pub struct SessionBroadcaster {
    sender: watch::Sender<Option<UserId>>,
}

impl SessionBroadcaster {
    pub fn new() -> SessionBroadcaster {
        let (sender, _) = watch::channel(None);
        SessionBroadcaster { sender }
    }

    /// Notifies every registered listener, even if the user did not change
    pub fn publish(&self, user: Option<UserId>) {
        self.sender.send_replace(user);
    }

    pub fn current(&self) -> Option<UserId> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> SessionListener {
        SessionListener {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of listeners that have not been released yet
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the signed-in user for as long as it is held. Dropping it unregisters the listener.
pub struct SessionListener {
    receiver: watch::Receiver<Option<UserId>>,
}

impl SessionListener {
    pub fn current_user(&self) -> Option<UserId> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next sign-in/sign-out transition. Returns [None] once the identity provider
    /// has gone away and no more transitions can happen.
    pub async fn changed(&mut self) -> Option<Option<UserId>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
