use sea_orm::entity::prelude::*;

/// A top-level grouping for titles, e.g. "books" or "movies".
/// Looked up by slug rather than numeric id.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Titles keep a nullable reference; deleting a category detaches them.
    #[sea_orm(has_many = "super::title::Entity")]
    Title,
}

impl Related<super::title::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Title.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
