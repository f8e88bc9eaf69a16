use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len(Users::Username, 150).unique_key())
                    .col(string_len(Users::Email, 254).unique_key())
                    .col(string_len_null(Users::FirstName, 150))
                    .col(string_len_null(Users::LastName, 150))
                    .col(text_null(Users::Bio))
                    .col(string_len(Users::Role, 20).default("user"))
                    .col(boolean(Users::IsStaff).default(false))
                    .col(boolean(Users::IsSuperuser).default(false))
                    .to_owned(),
            )
            .await?;

        // Create categories table
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(pk_auto(Categories::Id))
                    .col(string_len(Categories::Name, 256))
                    .col(string(Categories::Slug).unique_key())
                    .to_owned(),
            )
            .await?;

        // Create genres table
        manager
            .create_table(
                Table::create()
                    .table(Genres::Table)
                    .if_not_exists()
                    .col(pk_auto(Genres::Id))
                    .col(string_len(Genres::Name, 256))
                    .col(string(Genres::Slug).unique_key())
                    .to_owned(),
            )
            .await?;

        // Create titles table; a deleted category detaches its titles
        // instead of removing them
        manager
            .create_table(
                Table::create()
                    .table(Titles::Table)
                    .if_not_exists()
                    .col(pk_auto(Titles::Id))
                    .col(string_len(Titles::Name, 256))
                    .col(integer(Titles::Year))
                    .col(text_null(Titles::Description))
                    .col(integer_null(Titles::CategoryId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_title_category")
                            .from(Titles::Table, Titles::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create titles_genres table (join table)
        manager
            .create_table(
                Table::create()
                    .table(TitlesGenres::Table)
                    .if_not_exists()
                    .col(integer(TitlesGenres::TitleId))
                    .col(integer(TitlesGenres::GenreId))
                    .primary_key(
                        Index::create()
                            .name("pk_titles_genres")
                            .col(TitlesGenres::TitleId)
                            .col(TitlesGenres::GenreId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_titles_genres_title")
                            .from(TitlesGenres::Table, TitlesGenres::TitleId)
                            .to(Titles::Table, Titles::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_titles_genres_genre")
                            .from(TitlesGenres::Table, TitlesGenres::GenreId)
                            .to(Genres::Table, Genres::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create reviews table
        manager
            .create_table(
                Table::create()
                    .table(Reviews::Table)
                    .if_not_exists()
                    .col(pk_auto(Reviews::Id))
                    .col(integer(Reviews::TitleId))
                    .col(integer(Reviews::AuthorId))
                    .col(text(Reviews::Text))
                    .col(small_integer(Reviews::Score))
                    .col(timestamp_with_time_zone(Reviews::PubDate))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_title")
                            .from(Reviews::Table, Reviews::TitleId)
                            .to(Titles::Table, Titles::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_author")
                            .from(Reviews::Table, Reviews::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One review per (title, author); this backstops the
        // application-level duplicate check under concurrent creates
        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_title_author_unique")
                    .table(Reviews::Table)
                    .col(Reviews::TitleId)
                    .col(Reviews::AuthorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create comments table
        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(pk_auto(Comments::Id))
                    .col(integer(Comments::ReviewId))
                    .col(integer(Comments::AuthorId))
                    .col(text(Comments::Text))
                    .col(timestamp_with_time_zone(Comments::PubDate))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_review")
                            .from(Comments::Table, Comments::ReviewId)
                            .to(Reviews::Table, Reviews::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_author")
                            .from(Comments::Table, Comments::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Reviews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TitlesGenres::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Titles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Genres::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    FirstName,
    LastName,
    Bio,
    Role,
    IsStaff,
    IsSuperuser,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
    Slug,
}

#[derive(DeriveIden)]
enum Genres {
    Table,
    Id,
    Name,
    Slug,
}

#[derive(DeriveIden)]
enum Titles {
    Table,
    Id,
    Name,
    Year,
    Description,
    CategoryId,
}

#[derive(DeriveIden)]
enum TitlesGenres {
    Table,
    TitleId,
    GenreId,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    TitleId,
    AuthorId,
    Text,
    Score,
    PubDate,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    ReviewId,
    AuthorId,
    Text,
    PubDate,
}
