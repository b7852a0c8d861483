use sqlx::SqlitePool;

use crate::models::{map_profile, Profile};

/// Profiles are created on demand: the surrounding application owns user
/// registration, this core only needs the singleton row to exist.
pub async fn get_or_create(pool: &SqlitePool, user_id: &str) -> Result<Profile, sqlx::Error> {
    sqlx::query(r#"INSERT INTO "profiles" ("userId") VALUES (?) ON CONFLICT ("userId") DO NOTHING"#)
        .bind(user_id)
        .execute(pool)
        .await?;

    let row = sqlx::query(r#"SELECT * FROM "profiles" WHERE "userId" = ?"#)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(map_profile(&row))
}

pub async fn get(pool: &SqlitePool, user_id: &str) -> Result<Option<Profile>, sqlx::Error> {
    let row = sqlx::query(r#"SELECT * FROM "profiles" WHERE "userId" = ?"#)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| map_profile(&row)))
}
