use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque participant identifier, assigned by the backend.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_owned())
    }
}

/// Unordered two-party pair that scopes which messages belong together.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UserPair(UserId, UserId);

impl UserPair {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a < b { Self(a, b) } else { Self(b, a) }
    }

    pub fn min(&self) -> &UserId {
        &self.0
    }

    pub fn max(&self) -> &UserId {
        &self.1
    }

    /// True iff (sender, receiver) equals the pair in either direction.
    pub fn matches(&self, sender: &UserId, receiver: &UserId) -> bool {
        (sender == &self.0 && receiver == &self.1) || (sender == &self.1 && receiver == &self.0)
    }
}
