use crate::config::FirebaseConfig;
use crate::domain::identity::driven_ports::IdentityProvider;
use crate::domain::identity::{Credentials, SessionBroadcaster, SessionListener, SignInError, UserId};
use crate::external_connections::ExternalConnectivity;
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// ID tokens are refreshed this long before they actually expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A signed-in Firebase session
#[derive(Clone)]
struct AuthSession {
    user_id: UserId,
    id_token: String,
    refresh_token: String,
    expires_at: Instant,
}

impl AuthSession {
    fn needs_refresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN >= self.expires_at
    }
}

type SharedSession = Arc<RwLock<Option<AuthSession>>>;

/// Endpoints and key used to talk to Firebase Authentication
#[derive(Clone)]
struct AuthEndpoints {
    api_key: String,
    identity_toolkit_base_url: String,
    secure_token_base_url: String,
}

impl AuthEndpoints {
    fn sign_in_url(&self) -> String {
        format!(
            "{}/accounts:signInWithPassword",
            self.identity_toolkit_base_url
        )
    }

    fn refresh_url(&self) -> String {
        format!("{}/token", self.secure_token_base_url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'creds> {
    email: &'creds str,
    password: &'creds str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Serialize)]
struct RefreshRequest<'token> {
    grant_type: &'static str,
    refresh_token: &'token str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

fn expires_at(issued_at: Instant, expires_in: &str) -> Result<Instant, anyhow::Error> {
    let seconds: u64 = expires_in
        .parse()
        .with_context(|| format!("reading token lifetime \"{expires_in}\""))?;

    Ok(issued_at + Duration::from_secs(seconds))
}

/// Email/password sign-in against Firebase Authentication's REST API
pub struct FirebaseIdentity {
    endpoints: AuthEndpoints,
    session: SharedSession,
    broadcaster: SessionBroadcaster,
}

impl FirebaseIdentity {
    pub fn new(config: &FirebaseConfig) -> FirebaseIdentity {
        FirebaseIdentity {
            endpoints: AuthEndpoints {
                api_key: config.api_key.clone(),
                identity_toolkit_base_url: config.identity_toolkit_base_url.clone(),
                secure_token_base_url: config.secure_token_base_url.clone(),
            },
            session: Arc::new(RwLock::new(None)),
            broadcaster: SessionBroadcaster::new(),
        }
    }

    /// Hands out ID tokens of the current session to adapters that call other Firebase APIs
    pub fn token_source(&self) -> FirebaseTokenSource {
        FirebaseTokenSource {
            endpoints: self.endpoints.clone(),
            session: Arc::clone(&self.session),
        }
    }

    fn replace_session(&self, session: Option<AuthSession>) -> Result<(), anyhow::Error> {
        let mut current = self
            .session
            .write()
            .map_err(|_| anyhow!("auth session lock poisoned"))?;
        *current = session;
        Ok(())
    }
}

impl IdentityProvider for FirebaseIdentity {
    #[tracing::instrument(skip_all)]
    async fn sign_in(
        &self,
        credentials: &Credentials,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<UserId, SignInError> {
        if credentials.is_dismissed() {
            return Err(SignInError::Cancelled);
        }
        let Some(password) = credentials.secret.as_deref() else {
            return Err(SignInError::Rejected("a password is required".to_owned()));
        };

        let issued_at = Instant::now();
        let response = ext_cxn
            .http_client()
            .post(self.endpoints.sign_in_url())
            .query(&[("key", self.endpoints.api_key.as_str())])
            .json(&SignInRequest {
                email: credentials.principal.trim(),
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .context("sending sign-in request")?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignInError::Rejected(super::api_error_message(&body)));
        }
        let signed_in: SignInResponse = super::ensure_success(response, "signing in")
            .await?
            .json()
            .await
            .context("reading sign-in response")?;

        let user_id = UserId::new(signed_in.local_id)
            .ok_or_else(|| anyhow!("identity provider returned a blank user id"))?;
        self.replace_session(Some(AuthSession {
            user_id: user_id.clone(),
            id_token: signed_in.id_token,
            refresh_token: signed_in.refresh_token,
            expires_at: expires_at(issued_at, &signed_in.expires_in)?,
        }))?;

        info!("Signed in as {user_id}");
        self.broadcaster.publish(Some(user_id.clone()));
        Ok(user_id)
    }

    #[tracing::instrument(skip_all)]
    async fn sign_out(&self, _ext_cxn: &impl ExternalConnectivity) -> Result<(), anyhow::Error> {
        self.replace_session(None)?;
        info!("Signed out");
        self.broadcaster.publish(None);
        Ok(())
    }

    fn session_changes(&self) -> SessionListener {
        self.broadcaster.subscribe()
    }
}

/// Shared view of the signed-in session's ID token, refreshed on demand
#[derive(Clone)]
pub struct FirebaseTokenSource {
    endpoints: AuthEndpoints,
    session: SharedSession,
}

impl FirebaseTokenSource {
    /// A usable ID token for the signed-in user, or [None] when nobody is signed in
    pub async fn id_token(
        &self,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Option<String>, anyhow::Error> {
        let Some(session) = self.snapshot()? else {
            return Ok(None);
        };
        if !session.needs_refresh(Instant::now()) {
            return Ok(Some(session.id_token));
        }

        debug!("Refreshing expired ID token");
        let issued_at = Instant::now();
        let response = ext_cxn
            .http_client()
            .post(self.endpoints.refresh_url())
            .query(&[("key", self.endpoints.api_key.as_str())])
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token: &session.refresh_token,
            })
            .send()
            .await
            .context("sending token refresh request")?;
        let refreshed: RefreshResponse = super::ensure_success(response, "refreshing ID token")
            .await?
            .json()
            .await
            .context("reading token refresh response")?;

        let renewed = AuthSession {
            user_id: session.user_id,
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expires_at(issued_at, &refreshed.expires_in)?,
        };
        let id_token = renewed.id_token.clone();

        let mut current = self
            .session
            .write()
            .map_err(|_| anyhow!("auth session lock poisoned"))?;
        // Only keep the refreshed token if the same user is still signed in
        if current
            .as_ref()
            .is_some_and(|active| active.user_id == renewed.user_id)
        {
            *current = Some(renewed);
        }

        Ok(Some(id_token))
    }

    fn snapshot(&self) -> Result<Option<AuthSession>, anyhow::Error> {
        let session = self
            .session
            .read()
            .map_err(|_| anyhow!("auth session lock poisoned"))?;
        Ok(session.clone())
    }
}
