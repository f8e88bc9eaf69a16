use super::{title, title_genre};
use sea_orm::entity::prelude::*;

/// A genre label, attachable to any number of titles.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "genres")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::title_genre::Entity")]
    TitleGenre,
}

impl Related<title::Entity> for Entity {
    fn to() -> RelationDef {
        title_genre::Relation::Title.def()
    }

    fn via() -> Option<RelationDef> {
        Some(title_genre::Relation::Genre.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
