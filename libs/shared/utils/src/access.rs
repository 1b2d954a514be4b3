//! Capability grants handed to service operations.
//!
//! Handlers turn the authenticated `User` into a grant up front; services
//! accept the grant as an argument instead of inspecting ambient role state.

use tracing::warn;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

/// Permission to list, inspect and change the status of any appointment.
#[derive(Debug, Clone)]
pub struct ManageAppointments {
    account_id: String,
    role: Role,
}

impl ManageAppointments {
    pub const ROLES: [Role; 2] = [Role::Admin, Role::Doctor];

    pub fn authorize(user: &User) -> Result<Self, AppError> {
        match user.role() {
            Some(role) if Self::ROLES.contains(&role) => Ok(Self {
                account_id: user.id.clone(),
                role,
            }),
            other => {
                warn!("Account {} with role {:?} denied appointment management", user.id, other);
                Err(AppError::Forbidden("Only admins and doctors can manage appointments".to_string()))
            }
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

/// Administrative override, e.g. physically deleting an appointment.
#[derive(Debug, Clone)]
pub struct AdminOverride {
    account_id: String,
}

impl AdminOverride {
    pub fn authorize(user: &User) -> Result<Self, AppError> {
        if user.has_role(Role::Admin) {
            Ok(Self { account_id: user.id.clone() })
        } else {
            warn!("Account {} denied administrative override", user.id);
            Err(AppError::Forbidden("Only admins can perform this action".to_string()))
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::test_utils::TestUser;

    #[test]
    fn test_manage_appointments_roles() {
        assert!(ManageAppointments::authorize(&TestUser::admin("a@h.local").to_user()).is_ok());
        assert!(ManageAppointments::authorize(&TestUser::doctor("d@h.local").to_user()).is_ok());
        assert!(ManageAppointments::authorize(&TestUser::receptionist("r@h.local").to_user()).is_err());
        assert!(ManageAppointments::authorize(&TestUser::patient("p@h.local").to_user()).is_err());
    }

    #[test]
    fn test_admin_override_is_admin_only() {
        let admin = TestUser::admin("a@h.local").to_user();
        let grant = AdminOverride::authorize(&admin).expect("admin should be granted");
        assert_eq!(grant.account_id(), admin.id);

        let doctor = TestUser::doctor("d@h.local").to_user();
        assert_matches!(AdminOverride::authorize(&doctor), Err(AppError::Forbidden(_)));
    }
}
