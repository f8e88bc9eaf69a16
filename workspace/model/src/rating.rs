//! Query-time rating aggregation.
//!
//! A title's rating is the arithmetic mean of its review scores. It is
//! deliberately not stored anywhere: every read recomputes it from the
//! reviews table, so it can never drift out of sync.

use std::collections::HashMap;

use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, QueryFilter, QuerySelect,
};

use crate::entities::review;

#[derive(Debug, FromQueryResult)]
struct TitleRatingRow {
    title_id: i32,
    rating: Option<f64>,
}

/// Average review score for each of the given titles, in one grouped
/// query. Titles without reviews are absent from the map; callers turn a
/// missing entry into a null rating.
pub async fn for_titles(
    db: &DatabaseConnection,
    title_ids: &[i32],
) -> Result<HashMap<i32, f64>, DbErr> {
    if title_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let avg_score: SimpleExpr = Func::avg(Expr::col(review::Column::Score)).into();
    let rows = review::Entity::find()
        .select_only()
        .column(review::Column::TitleId)
        .column_as(avg_score, "rating")
        .filter(review::Column::TitleId.is_in(title_ids.iter().copied()))
        .group_by(review::Column::TitleId)
        .into_model::<TitleRatingRow>()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| row.rating.map(|avg| (row.title_id, avg)))
        .collect())
}

/// Average review score of a single title, `None` when it has no reviews.
pub async fn for_title(db: &DatabaseConnection, title_id: i32) -> Result<Option<f64>, DbErr> {
    let mut ratings = for_titles(db, &[title_id]).await?;
    Ok(ratings.remove(&title_id))
}

#[cfg(test)]
mod tests {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, Set};

    use super::*;
    use crate::entities::{review, title, user};

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");
        db
    }

    async fn seed_title(db: &DatabaseConnection, name: &str) -> title::Model {
        title::ActiveModel {
            name: Set(name.to_string()),
            year: Set(2001),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn seed_review(db: &DatabaseConnection, title_id: i32, author_id: i32, score: i16) {
        review::ActiveModel {
            title_id: Set(title_id),
            author_id: Set(author_id),
            text: Set("text".to_string()),
            score: Set(score),
            pub_date: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    async fn seed_user(db: &DatabaseConnection, username: &str) -> user::Model {
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
        .unwrap()
    }

    #[tokio::test]
    async fn title_without_reviews_has_no_rating() {
        let db = setup_db().await;
        let title = seed_title(&db, "Unrated").await;

        assert_eq!(for_title(&db, title.id).await.unwrap(), None);
        assert!(for_titles(&db, &[title.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rating_is_the_exact_mean_of_scores() {
        let db = setup_db().await;
        let title = seed_title(&db, "Rated").await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        seed_review(&db, title.id, alice.id, 8).await;
        seed_review(&db, title.id, bob.id, 6).await;

        assert_eq!(for_title(&db, title.id).await.unwrap(), Some(7.0));
    }

    #[tokio::test]
    async fn non_integer_means_are_preserved() {
        let db = setup_db().await;
        let title = seed_title(&db, "Odd").await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        seed_review(&db, title.id, alice.id, 8).await;
        seed_review(&db, title.id, bob.id, 7).await;

        assert_eq!(for_title(&db, title.id).await.unwrap(), Some(7.5));
    }

    #[tokio::test]
    async fn batch_lookup_groups_per_title() {
        let db = setup_db().await;
        let first = seed_title(&db, "First").await;
        let second = seed_title(&db, "Second").await;
        let third = seed_title(&db, "Third").await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        seed_review(&db, first.id, alice.id, 10).await;
        seed_review(&db, first.id, bob.id, 4).await;
        seed_review(&db, second.id, alice.id, 3).await;

        let ratings = for_titles(&db, &[first.id, second.id, third.id])
            .await
            .unwrap();
        assert_eq!(ratings.get(&first.id), Some(&7.0));
        assert_eq!(ratings.get(&second.id), Some(&3.0));
        assert_eq!(ratings.get(&third.id), None);
    }

    #[tokio::test]
    async fn empty_id_list_short_circuits() {
        let db = setup_db().await;
        assert!(for_titles(&db, &[]).await.unwrap().is_empty());
    }
}
