//! Pure allow/deny predicates combining authentication state, role and
//! object ownership. Handlers map a `false` here to 403 (or let the
//! extractor produce the 401 for missing credentials).

use model::entities::user;

/// Safe methods are open to everyone; unsafe methods require an
/// authenticated admin. Used endpoint-level for the catalog resources.
pub fn admin_or_read_only(method_safe: bool, requester: Option<&user::Model>) -> bool {
    method_safe || requester.map(user::Model::is_admin).unwrap_or(false)
}

/// Every method requires an authenticated admin. Used for the user
/// directory.
pub fn admin_only(requester: Option<&user::Model>) -> bool {
    requester.map(user::Model::is_admin).unwrap_or(false)
}

/// Object-level gate for review/comment mutation: the author may touch
/// their own record, moderators and admins may touch anyone's.
pub fn can_modify_object(requester: &user::Model, author_id: i32) -> bool {
    requester.id == author_id || requester.is_moderator() || requester.is_admin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::entities::user::UserRole;

    fn make_user(id: i32, role: UserRole) -> user::Model {
        user::Model {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            first_name: None,
            last_name: None,
            bio: None,
            role,
            is_staff: false,
            is_superuser: false,
        }
    }

    #[test]
    fn safe_methods_are_open_to_anonymous() {
        assert!(admin_or_read_only(true, None));
    }

    #[test]
    fn unsafe_methods_require_admin() {
        let reader = make_user(1, UserRole::User);
        let moderator = make_user(2, UserRole::Moderator);
        let admin = make_user(3, UserRole::Admin);

        assert!(!admin_or_read_only(false, None));
        assert!(!admin_or_read_only(false, Some(&reader)));
        assert!(!admin_or_read_only(false, Some(&moderator)));
        assert!(admin_or_read_only(false, Some(&admin)));
    }

    #[test]
    fn staff_flag_passes_the_admin_gate() {
        let mut staff = make_user(4, UserRole::User);
        staff.is_staff = true;
        assert!(admin_or_read_only(false, Some(&staff)));
        assert!(admin_only(Some(&staff)));
    }

    #[test]
    fn admin_only_rejects_everyone_else() {
        let reader = make_user(1, UserRole::User);
        let moderator = make_user(2, UserRole::Moderator);
        let admin = make_user(3, UserRole::Admin);

        assert!(!admin_only(None));
        assert!(!admin_only(Some(&reader)));
        assert!(!admin_only(Some(&moderator)));
        assert!(admin_only(Some(&admin)));
    }

    #[test]
    fn authors_moderators_and_admins_may_modify() {
        let author = make_user(1, UserRole::User);
        let stranger = make_user(2, UserRole::User);
        let moderator = make_user(3, UserRole::Moderator);
        let admin = make_user(4, UserRole::Admin);

        assert!(can_modify_object(&author, 1));
        assert!(!can_modify_object(&stranger, 1));
        assert!(can_modify_object(&moderator, 1));
        assert!(can_modify_object(&admin, 1));
    }
}
