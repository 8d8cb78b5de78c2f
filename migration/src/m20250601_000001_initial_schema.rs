use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable foreign keys for SQLite
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            manager
                .get_connection()
                .execute_unprepared("PRAGMA foreign_keys = ON")
                .await?;
        }

        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string_uniq(Users::Username))
                    .col(string_uniq(Users::Email))
                    .col(string(Users::PasswordHash))
                    .col(
                        ColumnDef::new(Users::IsAdmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(big_integer(Users::CreatedAt))
                    .col(big_integer_null(Users::LastLogin))
                    .to_owned(),
            )
            .await?;

        // Create water_stations table
        manager
            .create_table(
                Table::create()
                    .table(WaterStations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WaterStations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string_uniq(WaterStations::Name))
                    .col(big_integer(WaterStations::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Create feedback table
        manager
            .create_table(
                Table::create()
                    .table(Feedback::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Feedback::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(integer(Feedback::StationId))
                    .col(string(Feedback::CustomerName))
                    .col(string_null(Feedback::Email))
                    .col(string_null(Feedback::Phone))
                    .col(integer(Feedback::Rating))
                    .col(text(Feedback::FeedbackText))
                    .col(text_null(Feedback::Suggestions))
                    .col(big_integer(Feedback::CreatedAt))
                    .col(
                        ColumnDef::new(Feedback::Status)
                            .string()
                            .not_null()
                            .default("new"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feedback_station")
                            .from(Feedback::Table, Feedback::StationId)
                            .to(WaterStations::Table, WaterStations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Create index on feedback.station_id for per-station queries
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_feedback_station")
                    .table(Feedback::Table)
                    .col(Feedback::StationId)
                    .to_owned(),
            )
            .await?;

        // Create sessions table
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::SessionId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(integer(Sessions::UserId))
                    .col(big_integer(Sessions::CreatedAt))
                    .col(big_integer(Sessions::ExpiresAt))
                    .col(
                        ColumnDef::new(Sessions::Remember)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Feedback::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WaterStations::Table).to_owned())
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
    PasswordHash,
    IsAdmin,
    CreatedAt,
    LastLogin,
}

#[derive(DeriveIden)]
enum WaterStations {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Feedback {
    Table,
    Id,
    StationId,
    CustomerName,
    Email,
    Phone,
    Rating,
    FeedbackText,
    Suggestions,
    CreatedAt,
    Status,
}

#[derive(DeriveIden)]
enum Sessions {
    Table,
    SessionId,
    UserId,
    CreatedAt,
    ExpiresAt,
    Remember,
}
