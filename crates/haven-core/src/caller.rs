//! Caller identity handed to services by the authorization collaborator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::UserId;

/// Platform role carried in the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular registered user.
    #[default]
    User,
    /// A counselor who runs sessions and writes content.
    Counselor,
    /// Platform administrator.
    Admin,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Counselor => "counselor",
            Self::Admin => "admin",
        }
    }

    /// Admins and counselors are staff.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::Counselor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "counselor" => Ok(Self::Counselor),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// An authenticated caller: who is asking, and in which role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// The caller's user id.
    pub user_id: UserId,
    /// The caller's role.
    pub role: Role,
}

impl Caller {
    /// Create a caller.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether the caller is an administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Whether the caller is staff (admin or counselor).
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Whether the caller owns a record whose owner attribute is `owner`.
    #[must_use]
    pub fn owns(&self, owner: &str) -> bool {
        self.user_id.to_string() == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_and_display() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("counselor".parse::<Role>().unwrap(), Role::Counselor);
        assert_eq!(Role::User.to_string(), "user");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Counselor).unwrap();
        assert_eq!(json, "\"counselor\"");
    }

    #[test]
    fn caller_ownership() {
        let user_id = UserId::generate();
        let caller = Caller::new(user_id, Role::User);
        assert!(caller.owns(&user_id.to_string()));
        assert!(!caller.owns("someone-else"));
        assert!(!caller.is_staff());
        assert!(Caller::new(user_id, Role::Counselor).is_staff());
    }
}
