//! Authentication handshake.
//!
//! Right after a transport opens, the channel may announce who it is with a
//! single `authenticate` frame. The identity comes from an
//! [`IdentityProvider`] owned by the session layer; the channel only reads
//! it, once per open, and never refreshes it.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use sz_core::config::{IdentitySettings, UserId};
use sz_core::constants::frame_types;
use sz_core::error::{SzError, SzResult};

use crate::events::Frame;

/// The user reference and credential sent in the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub token: String,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

/// Source of the identity used by the handshake.
///
/// Queried each time a connection opens. Returning `None` skips the
/// handshake for that open.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> Option<Identity>;
}

impl<F> IdentityProvider for F
where
    F: Fn() -> Option<Identity> + Send + Sync,
{
    fn identity(&self) -> Option<Identity> {
        self()
    }
}

/// A fixed identity, typically built from the config file.
#[derive(Debug, Clone)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self(Some(identity))
    }

    /// Build from config; incomplete settings yield an empty provider.
    pub fn from_settings(settings: &IdentitySettings) -> Self {
        match (&settings.user_id, &settings.token) {
            (Some(user_id), Some(token)) if !token.is_empty() => {
                Self(Some(Identity::new(user_id.clone(), token.clone())))
            }
            _ => Self(None),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

/// An identity the session layer can replace while the channel runs.
///
/// A new token takes effect on the next open.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    inner: Arc<RwLock<Option<Identity>>>,
}

impl SharedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, identity: Identity) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(identity);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = None;
        }
    }
}

impl IdentityProvider for SharedIdentity {
    fn identity(&self) -> Option<Identity> {
        self.inner.read().ok()?.clone()
    }
}

#[derive(Serialize)]
struct AuthenticateFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "userId")]
    user_id: &'a UserId,
    token: &'a str,
}

/// Build the `{"type":"authenticate","userId":..,"token":..}` frame.
pub fn authenticate_frame(identity: &Identity) -> SzResult<Frame> {
    let frame = AuthenticateFrame {
        kind: frame_types::AUTHENTICATE,
        user_id: &identity.user_id,
        token: &identity.token,
    };
    Frame::json(&frame).map_err(|e| SzError::Handshake(e.to_string()))
}
