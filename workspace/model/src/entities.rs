//! SeaORM entity modules for the review-aggregation data model:
//! accounts, the catalog (categories, genres, titles) and the feedback
//! tables (reviews, comments).

pub mod category;
pub mod comment;
pub mod genre;
pub mod review;
pub mod title;
pub mod title_genre;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::category::Entity as Category;
    pub use super::comment::Entity as Comment;
    pub use super::genre::Entity as Genre;
    pub use super::review::Entity as Review;
    pub use super::title::Entity as Title;
    pub use super::title_genre::Entity as TitleGenre;
    pub use super::user::Entity as User;
}

#[cfg(test)]
mod test {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, PaginatorTrait, QueryFilter, Set, SqlErr,
    };

    use super::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys so cascade rules actually fire
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    async fn create_user(db: &DatabaseConnection, username: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            role: Set(user::UserRole::User),
            is_staff: Set(false),
            is_superuser: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    async fn create_title(db: &DatabaseConnection, name: &str) -> Result<title::Model, DbErr> {
        title::ActiveModel {
            name: Set(name.to_string()),
            year: Set(1999),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    async fn create_review(
        db: &DatabaseConnection,
        title_id: i32,
        author_id: i32,
        score: i16,
    ) -> Result<review::Model, DbErr> {
        review::ActiveModel {
            title_id: Set(title_id),
            author_id: Set(author_id),
            text: Set("thoughts".to_string()),
            score: Set(score),
            pub_date: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    #[tokio::test]
    async fn second_review_for_same_title_and_author_is_rejected() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let author = create_user(&db, "critic").await?;
        let title = create_title(&db, "Dune").await?;

        create_review(&db, title.id, author.id, 7).await?;
        let err = create_review(&db, title.id, author.id, 9)
            .await
            .expect_err("duplicate (title, author) review must not insert");

        assert!(matches!(
            err.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
        ));

        // The original review is untouched
        let count = review::Entity::find()
            .filter(review::Column::TitleId.eq(title.id))
            .count(&db)
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn same_author_may_review_different_titles() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let author = create_user(&db, "critic").await?;
        let first = create_title(&db, "Dune").await?;
        let second = create_title(&db, "Solaris").await?;

        create_review(&db, first.id, author.id, 7).await?;
        create_review(&db, second.id, author.id, 9).await?;

        assert_eq!(review::Entity::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_a_title_cascades_reviews_and_comments() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let author = create_user(&db, "critic").await?;
        let title = create_title(&db, "Dune").await?;
        let review = create_review(&db, title.id, author.id, 7).await?;

        comment::ActiveModel {
            review_id: Set(review.id),
            author_id: Set(author.id),
            text: Set("agreed".to_string()),
            pub_date: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        title::Entity::delete_by_id(title.id).exec(&db).await?;

        assert_eq!(review::Entity::find().count(&db).await?, 0);
        assert_eq!(comment::Entity::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_a_review_cascades_its_comments_only() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let author = create_user(&db, "critic").await?;
        let title = create_title(&db, "Dune").await?;
        let kept = create_review(&db, title.id, author.id, 7).await?;

        let other_author = create_user(&db, "other").await?;
        let dropped = create_review(&db, title.id, other_author.id, 4).await?;

        for review_id in [kept.id, dropped.id] {
            comment::ActiveModel {
                review_id: Set(review_id),
                author_id: Set(author.id),
                text: Set("noted".to_string()),
                pub_date: Set(chrono::Utc::now()),
                ..Default::default()
            }
            .insert(&db)
            .await?;
        }

        review::Entity::delete_by_id(dropped.id).exec(&db).await?;

        let remaining = comment::Entity::find().all(&db).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].review_id, kept.id);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_a_category_detaches_titles() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let category = category::ActiveModel {
            name: Set("Movies".to_string()),
            slug: Set("movies".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let title = title::ActiveModel {
            name: Set("Stalker".to_string()),
            year: Set(1979),
            category_id: Set(Some(category.id)),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        category::Entity::delete_by_id(category.id).exec(&db).await?;

        let reloaded = title::Entity::find_by_id(title.id)
            .one(&db)
            .await?
            .expect("title must survive category deletion");
        assert_eq!(reloaded.category_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn genres_link_to_titles_through_the_join_table() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let title = create_title(&db, "Dune").await?;
        let genre = genre::ActiveModel {
            name: Set("Sci-Fi".to_string()),
            slug: Set("sci-fi".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        title_genre::ActiveModel {
            title_id: Set(title.id),
            genre_id: Set(genre.id),
        }
        .insert(&db)
        .await?;

        let linked = title::Entity::find_by_id(title.id)
            .one(&db)
            .await?
            .unwrap()
            .find_related(genre::Entity)
            .all(&db)
            .await?;
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].slug, "sci-fi");
        Ok(())
    }
}
