use super::{category, genre, title_genre};
use sea_orm::entity::prelude::*;

/// A reviewable creative work (book, film, album, ...).
///
/// The rating is never stored here; it is the average of the associated
/// review scores, computed at query time by [`crate::rating`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "titles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Release year; must not lie in the future.
    pub year: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Nulled out when the category is deleted.
    pub category_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::review::Entity")]
    Review,
    #[sea_orm(has_many = "super::title_genre::Entity")]
    TitleGenre,
}

impl Related<category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl Related<genre::Entity> for Entity {
    fn to() -> RelationDef {
        title_genre::Relation::Genre.def()
    }

    fn via() -> Option<RelationDef> {
        Some(title_genre::Relation::Title.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
