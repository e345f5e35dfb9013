//! Session boundary: current-user notifications and sign-in/out actions.
//!
//! The identity protocol itself stays external; adapters implement
//! [`IdentityProvider`] and the rest of the application only ever observes
//! the [`SessionHub`] channel.

use anyhow::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use taskdeck_core::id::UserId;

/// An authenticated identity context; owns zero or more tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque owner identifier issued by the provider.
    pub user_id: UserId,
    /// Display name, when the provider supplies one.
    pub display_name: Option<String>,
    /// Contact email, when the provider supplies one.
    pub email: Option<String>,
    /// Avatar image URL, when the provider supplies one.
    pub avatar_url: Option<String>,
}

impl Session {
    /// Session carrying only an identifier.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            email: None,
            avatar_url: None,
        }
    }
}

/// External identity provider driving interactive sign-in and sign-out.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    /// Error type bubbled up from the provider.
    type Error: Into<Error>;

    /// Run the provider's interactive sign-in flow.
    ///
    /// # Errors
    /// Returns a provider-specific error when the flow fails or is
    /// cancelled.
    async fn begin_sign_in(&self) -> Result<Session, Self::Error>;

    /// End the provider-side session.
    ///
    /// # Errors
    /// Returns a provider-specific error when sign-out fails.
    async fn end_session(&self) -> Result<(), Self::Error>;
}

/// Errors surfaced by the session boundary.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Interactive sign-in failed; the hub stays signed out.
    #[error("sign-in failed: {0}")]
    SignIn(#[source] Error),
    /// Provider-side sign-out failed; the local session is ended anyway.
    #[error("sign-out failed: {0}")]
    SignOut(#[source] Error),
}

/// Publishes the current session over a watch channel.
///
/// Constructed once at startup and handed to every component that needs
/// session access; there are no module-level singletons.
#[derive(Debug)]
pub struct SessionHub {
    tx: watch::Sender<Option<Session>>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    /// Create a hub with no signed-in session.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    /// Publish a freshly established session.
    pub fn sign_in(&self, session: Session) {
        info!(user = %session.user_id, "session established");
        self.tx.send_replace(Some(session));
    }

    /// Clear the current session.
    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            info!("session ended");
        }
    }

    /// Run a provider's interactive sign-in and publish the result.
    ///
    /// A failed sign-in leaves the hub signed out.
    ///
    /// # Errors
    /// Returns [`SessionError::SignIn`] when the provider flow fails.
    pub async fn sign_in_with<P>(&self, provider: &P) -> Result<Session, SessionError>
    where
        P: IdentityProvider,
    {
        match provider.begin_sign_in().await {
            Ok(session) => {
                self.sign_in(session.clone());
                Ok(session)
            }
            Err(err) => {
                let err = err.into();
                warn!(error = %err, "interactive sign-in failed");
                Err(SessionError::SignIn(err))
            }
        }
    }

    /// End the session locally, then with the provider.
    ///
    /// The local session is cleared even when the provider call fails, so a
    /// broken provider can never keep the list visible.
    ///
    /// # Errors
    /// Returns [`SessionError::SignOut`] when the provider call fails.
    pub async fn end_session_with<P>(&self, provider: &P) -> Result<(), SessionError>
    where
        P: IdentityProvider,
    {
        self.sign_out();
        provider.end_session().await.map_err(|err| {
            let err = err.into();
            warn!(error = %err, "provider-side sign-out failed");
            SessionError::SignOut(err)
        })
    }
}
