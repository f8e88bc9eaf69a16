use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Access level of an account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "moderator")]
    Moderator,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

/// A registered account that authors reviews and comments.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,
    pub role: UserRole,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Review,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Admin privilege comes from the role field or from either of the
    /// staff/superuser flags; all three paths must grant it.
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin || self.is_staff || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == UserRole::Moderator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_user() -> Model {
        Model {
            id: 1,
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            first_name: None,
            last_name: None,
            bio: None,
            role: UserRole::User,
            is_staff: false,
            is_superuser: false,
        }
    }

    #[test]
    fn role_admin_grants_admin() {
        let user = Model {
            role: UserRole::Admin,
            ..plain_user()
        };
        assert!(user.is_admin());
        assert!(!user.is_moderator());
    }

    #[test]
    fn staff_flag_grants_admin_regardless_of_role() {
        let user = Model {
            is_staff: true,
            ..plain_user()
        };
        assert!(user.is_admin());
    }

    #[test]
    fn superuser_flag_grants_admin_regardless_of_role() {
        let user = Model {
            is_superuser: true,
            ..plain_user()
        };
        assert!(user.is_admin());
    }

    #[test]
    fn moderator_is_not_admin() {
        let user = Model {
            role: UserRole::Moderator,
            ..plain_user()
        };
        assert!(user.is_moderator());
        assert!(!user.is_admin());
    }
}
