//! Player identity used when joining and answering.
//!
//! The session controller asks its [`IdentityProvider`] once, at
//! construction, and keeps the id for the rest of the session so that it
//! does not drift across reconnects. Real frontends plug in the id of the
//! signed-in user; [`RandomIdentity`] covers anonymous play.

use rand::RngExt;

/// Supplies the user id a session plays under.
pub trait IdentityProvider {
    fn user_id(&self) -> String;
}

/// A fixed, externally known id (e.g. from the auth store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIdentity(pub String);

impl FixedIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }
}

impl IdentityProvider for FixedIdentity {
    fn user_id(&self) -> String {
        self.0.clone()
    }
}

/// Generates a fresh anonymous id on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentity;

impl IdentityProvider for RandomIdentity {
    fn user_id(&self) -> String {
        random_user_id()
    }
}

const ANON_ID_LEN: usize = 9;

/// `user_` followed by nine base-36 characters.
pub fn random_user_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ANON_ID_LEN)
        .map(|_| {
            let digit = rng.random_range(0..36u32);
            char::from_digit(digit, 36).unwrap_or('0')
        })
        .collect();
    format!("user_{suffix}")
}
