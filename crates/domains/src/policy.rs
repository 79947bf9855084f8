//! # Role Policy
//!
//! Pure decisions mapping a role to permitted actions. Callers holding a raw
//! role string go through [`Role::parse`], so an unrecognized role is always
//! treated as `General`.

use crate::models::Role;

pub fn can_write_post(role: Role) -> bool {
    matches!(role, Role::Supervisor | Role::Admin | Role::Core)
}

pub fn can_delete_post(role: Role) -> bool {
    matches!(role, Role::Supervisor | Role::Admin)
}

pub fn can_manage_users(role: Role) -> bool {
    matches!(role, Role::Supervisor | Role::Admin)
}

/// Supervisor may change anyone; admin anyone who is not already supervisor.
pub fn can_change_role(actor: Role, target: Role) -> bool {
    match actor {
        Role::Supervisor => true,
        Role::Admin => target != Role::Supervisor,
        Role::Core | Role::General => false,
    }
}

/// Whether `actor` may hand out `granted`. Only a supervisor can mint another
/// supervisor; otherwise the same rule as [`can_change_role`] applies.
pub fn can_assign_role(actor: Role, granted: Role) -> bool {
    match granted {
        Role::Supervisor => actor == Role::Supervisor,
        _ => can_manage_users(actor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_permissions() {
        assert!(can_write_post(Role::Supervisor));
        assert!(can_write_post(Role::Admin));
        assert!(can_write_post(Role::Core));
        assert!(!can_write_post(Role::General));
    }

    #[test]
    fn delete_and_manage_permissions() {
        for role in Role::ALL {
            let expected = matches!(role, Role::Supervisor | Role::Admin);
            assert_eq!(can_delete_post(role), expected, "{role}");
            assert_eq!(can_manage_users(role), expected, "{role}");
        }
    }

    #[test]
    fn unrecognized_role_gets_least_privilege() {
        let role = Role::parse("moderator");
        assert!(!can_write_post(role));
        assert!(!can_delete_post(role));
        assert!(!can_manage_users(role));
        assert!(!can_change_role(role, Role::General));
    }

    #[test]
    fn role_change_matrix() {
        for target in Role::ALL {
            assert!(can_change_role(Role::Supervisor, target));
            assert!(!can_change_role(Role::Core, target));
            assert!(!can_change_role(Role::General, target));
        }
        assert!(!can_change_role(Role::Admin, Role::Supervisor));
        assert!(can_change_role(Role::Admin, Role::Admin));
        assert!(can_change_role(Role::Admin, Role::General));
    }

    #[test]
    fn only_supervisor_grants_supervisor() {
        assert!(can_assign_role(Role::Supervisor, Role::Supervisor));
        assert!(!can_assign_role(Role::Admin, Role::Supervisor));
        assert!(can_assign_role(Role::Admin, Role::Core));
        assert!(!can_assign_role(Role::Core, Role::General));
    }
}
