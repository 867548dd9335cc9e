//! crates/portal_core/src/session.rs
//!
//! The session gate: the single owner of the client's authentication state.
//!
//! A `SessionContext` wraps a `SessionStore` and is shared (behind an `Arc`)
//! with every component that needs the token or the profile. It moves between
//! `Authenticated` and `Unauthenticated` only through `init`, `login`,
//! `logout` and `expire`, and publishes every change on a watch channel.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::{AuthState, Credentials, LoginGrant, Session, UserProfile};
use crate::ports::{PortError, PortResult, PortalApi, SessionStore};

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Storage key of the JSON-encoded user profile.
pub const USER_KEY: &str = "user";

/// Shown when a login fails and the backend gave no message of its own.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials.";

pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    default_identity: UserProfile,
    state: watch::Sender<AuthState>,
}

impl SessionContext {
    /// Creates a context in the `Unauthenticated` state. Call `init` before use.
    pub fn new(store: Arc<dyn SessionStore>, default_identity: UserProfile) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            store,
            default_identity,
            state,
        }
    }

    /// Reads the stored token and settles the start-up state.
    ///
    /// A store that cannot be read counts as "no session".
    pub async fn init(&self) -> AuthState {
        let state = match self.store.get(TOKEN_KEY).await {
            Ok(Some(token)) if !token.trim().is_empty() => AuthState::Authenticated,
            Ok(_) => AuthState::Unauthenticated,
            Err(e) => {
                warn!("Could not read stored session: {}", e);
                AuthState::Unauthenticated
            }
        };
        self.state.send_replace(state);
        debug!(?state, "Session initialised");
        state
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// The stored bearer token, if any.
    pub async fn token(&self) -> PortResult<Option<String>> {
        Ok(self
            .store
            .get(TOKEN_KEY)
            .await?
            .filter(|token| !token.trim().is_empty()))
    }

    /// The stored profile, or the default identity when it is missing or malformed.
    pub async fn profile(&self) -> UserProfile {
        match self.store.get(USER_KEY).await {
            Ok(raw) => resolve_profile(raw.as_deref(), &self.default_identity),
            Err(e) => {
                warn!("Could not read stored profile: {}", e);
                self.default_identity.clone()
            }
        }
    }

    /// Exchanges credentials for a session and persists it.
    pub async fn login(
        &self,
        api: &dyn PortalApi,
        credentials: &Credentials,
    ) -> PortResult<Session> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(PortError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        let grant = api.login(credentials).await?;
        self.establish(grant, &credentials.email).await
    }

    /// Persists a login grant and moves to `Authenticated`.
    ///
    /// A grant without a user falls back to the default name paired with the
    /// email the learner logged in with. A grant without a token is rejected.
    pub async fn establish(&self, grant: LoginGrant, email: &str) -> PortResult<Session> {
        let token = grant
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                PortError::InvalidResponse("login response did not include a token".to_string())
            })?;
        let user = grant
            .user
            .unwrap_or_else(|| UserProfile::new(self.default_identity.name.clone(), email));

        // Token last; its presence marks a session.
        let encoded = serde_json::to_string(&user).unwrap_or_default();
        self.store.set(USER_KEY, &encoded).await?;
        if let Err(e) = self.store.set(TOKEN_KEY, &token).await {
            let _ = self.store.remove(USER_KEY).await;
            return Err(e);
        }

        self.state.send_replace(AuthState::Authenticated);
        info!(email = %user.email, "Logged in");
        Ok(Session { token, user })
    }

    /// Explicit logout. Always ends `Unauthenticated`, whatever the current state.
    pub async fn logout(&self) -> PortResult<()> {
        self.state.send_replace(AuthState::Unauthenticated);
        self.clear_storage().await?;
        info!("Logged out");
        Ok(())
    }

    /// Tears the session down after the backend rejected the token.
    ///
    /// Only the first caller while `Authenticated` clears storage; later and
    /// concurrent callers get `false` and do nothing.
    pub async fn expire(&self) -> PortResult<bool> {
        let torn_down = self.state.send_if_modified(|state| {
            if state.is_authenticated() {
                *state = AuthState::Unauthenticated;
                true
            } else {
                false
            }
        });
        if !torn_down {
            return Ok(false);
        }
        self.clear_storage().await?;
        warn!("Session rejected by the backend; stored credentials cleared");
        Ok(true)
    }

    /// Removes both keys even if one removal fails; reports the first failure.
    async fn clear_storage(&self) -> PortResult<()> {
        let token = self.store.remove(TOKEN_KEY).await;
        let user = self.store.remove(USER_KEY).await;
        if let Err(e) = &token {
            error!("Could not remove stored token: {}", e);
        }
        token.and(user)
    }
}

/// Turns a stored profile into a usable identity, field by field.
pub fn resolve_profile(raw: Option<&str>, default: &UserProfile) -> UserProfile {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return default.clone();
    };
    let fields = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return default.clone(),
        Err(e) => {
            warn!("Stored profile is not valid JSON: {}", e);
            return default.clone();
        }
    };
    let field = |key: &str, fallback: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    UserProfile {
        name: field("name", default.name.as_str()),
        email: field("email", default.email.as_str()),
    }
}

/// The message to show for a failed login.
pub fn login_failure_message(err: &PortError) -> String {
    match err {
        PortError::Validation(message) => message.clone(),
        other => other
            .backend_message()
            .unwrap_or(LOGIN_FAILED_MESSAGE)
            .to_string(),
    }
}
