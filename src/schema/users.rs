use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use sea_orm_migration::prelude::*;

pub async fn apply(
    manager: &SchemaManager<'_>,
    conn: &DatabaseConnection,
) -> Result<(), DbErr> {
    if !manager.has_table("users").await? {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Email)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Users::EncryptedPassword)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Users::Name).string())
                    .col(ColumnDef::new(Users::Provider).string())
                    .col(ColumnDef::new(Users::ExternalId).string())
                    .col(ColumnDef::new(Users::AvatarUrl).string())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(SimpleExpr::Custom("now()".into())),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(SimpleExpr::Custom("now()".into())),
                    )
                    .to_owned(),
            )
            .await?;
    }

    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        "CREATE UNIQUE INDEX IF NOT EXISTS users_email_unique \
         ON users (lower(email))"
            .to_string(),
    ))
    .await?;

    // Partial so that accounts without a linked identity never collide.
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        "CREATE UNIQUE INDEX IF NOT EXISTS users_provider_external_id_unique \
         ON users (provider, external_id) \
         WHERE provider IS NOT NULL AND external_id IS NOT NULL"
            .to_string(),
    ))
    .await?;

    Ok(())
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
    EncryptedPassword,
    Name,
    Provider,
    ExternalId,
    AvatarUrl,
    CreatedAt,
    UpdatedAt,
}
