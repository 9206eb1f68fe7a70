use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a canteen user, assigned by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The already-authenticated caller on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub is_staff: bool,
}

impl Actor {
    pub fn customer(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_staff: false,
        }
    }

    pub fn staff(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            is_staff: true,
        }
    }

    pub fn owns(&self, owner: UserId) -> bool {
        self.user_id == owner
    }
}
