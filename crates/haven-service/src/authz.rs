//! Role and ownership checks shared by every service.

use haven_core::Caller;

use crate::error::{Result, ServiceError};

/// The caller, or `Unauthorized` for anonymous requests.
///
/// # Errors
///
/// Returns `ServiceError::Unauthorized` when `caller` is `None`.
pub fn require_caller(caller: Option<&Caller>) -> Result<&Caller> {
    caller.ok_or(ServiceError::Unauthorized)
}

/// # Errors
///
/// Returns `ServiceError::Forbidden` unless the caller is an admin.
pub fn require_admin(caller: &Caller) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("admin role required".into()))
    }
}

/// # Errors
///
/// Returns `ServiceError::Forbidden` unless the caller is an admin or counselor.
pub fn require_staff(caller: &Caller) -> Result<()> {
    if caller.is_staff() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("staff role required".into()))
    }
}

/// # Errors
///
/// Returns `ServiceError::Forbidden` unless the caller owns the record or is
/// an admin.
pub fn require_owner_or_admin(caller: &Caller, owner: &str) -> Result<()> {
    if caller.is_admin() || caller.owns(owner) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "only the owner or an admin may do this".into(),
        ))
    }
}

/// Whether an optional caller is staff. Anonymous callers are not.
#[must_use]
pub fn is_staff(caller: Option<&Caller>) -> bool {
    caller.is_some_and(Caller::is_staff)
}

/// Whether an optional caller is an admin.
#[must_use]
pub fn is_admin(caller: Option<&Caller>) -> bool {
    caller.is_some_and(Caller::is_admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::{Role, UserId};

    fn caller(role: Role) -> Caller {
        Caller::new(UserId::generate(), role)
    }

    #[test]
    fn admin_and_staff_checks() {
        assert!(require_admin(&caller(Role::Admin)).is_ok());
        assert!(require_admin(&caller(Role::Counselor)).is_err());
        assert!(require_staff(&caller(Role::Counselor)).is_ok());
        assert!(matches!(
            require_staff(&caller(Role::User)),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn owner_or_admin() {
        let user = caller(Role::User);
        let owner = user.user_id.to_string();
        assert!(require_owner_or_admin(&user, &owner).is_ok());
        assert!(require_owner_or_admin(&caller(Role::User), &owner).is_err());
        assert!(require_owner_or_admin(&caller(Role::Admin), &owner).is_ok());
        // Counselors do not get owner rights on other people's records
        assert!(require_owner_or_admin(&caller(Role::Counselor), &owner).is_err());
    }

    #[test]
    fn anonymous_caller() {
        assert!(matches!(require_caller(None), Err(ServiceError::Unauthorized)));
        assert!(!is_staff(None));
        assert!(!is_admin(None));
    }
}
