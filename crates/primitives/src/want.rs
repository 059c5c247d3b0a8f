#[cfg(test)]
#[path = "tests/want.rs"]
mod tests;

use core::fmt;
use core::str::FromStr;

use crate::cid::Cid;

/// Opaque capability presented alongside a want, checked by the serving
/// peer's authoriser. Rendered as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthToken(Box<[u8]>);

impl AuthToken {
    #[must_use]
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// Wire form of an optional token: an empty field means no token.
    #[must_use]
    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        (!bytes.is_empty()).then(|| Self::new(bytes))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_hex())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthToken").field(&self.to_hex()).finish()
    }
}

impl FromStr for AuthToken {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(hex::decode(s)?))
    }
}

/// Interest in one block, optionally under an auth token.
///
/// Two wants for the same CID with different tokens are distinct.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Want {
    pub cid: Cid,
    pub auth: Option<AuthToken>,
}

impl Want {
    #[must_use]
    pub const fn new(cid: Cid) -> Self {
        Self { cid, auth: None }
    }

    #[must_use]
    pub const fn with_auth(cid: Cid, auth: Option<AuthToken>) -> Self {
        Self { cid, auth }
    }

    /// Builds a want from its wire fields.
    #[must_use]
    pub fn from_wire(cid: Cid, auth: &[u8]) -> Self {
        Self::with_auth(cid, AuthToken::from_wire(auth))
    }

    #[must_use]
    pub fn auth_bytes(&self) -> &[u8] {
        self.auth.as_ref().map_or(&[][..], AuthToken::as_bytes)
    }
}

impl fmt::Display for Want {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.auth {
            Some(auth) => write!(f, "{}?auth={auth}", self.cid),
            None => write!(f, "{}", self.cid),
        }
    }
}
