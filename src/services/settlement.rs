use chrono::{Datelike, Duration, NaiveDate, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::db::Database;
use crate::models::{map_ledger, WeeklyLedger};

/// Most recent Monday at or before `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Monday-to-Sunday window containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = week_start_of(date);
    (start, start + Duration::days(6))
}

/// Returns the current week's ledger row for the user, creating it if
/// needed. As a side effect, folds every finalized-but-uncollected prior
/// week's coins into the profile balance — the single gate through which
/// stale-week coins reach the durable balance.
pub async fn get_or_create_current_ledger(
    db: &Database,
    user_id: &str,
) -> Result<WeeklyLedger, sqlx::Error> {
    get_or_create_ledger_at(db, user_id, Utc::now().date_naive()).await
}

pub async fn get_or_create_ledger_at(
    db: &Database,
    user_id: &str,
    today: NaiveDate,
) -> Result<WeeklyLedger, sqlx::Error> {
    let (week_start, week_end) = week_bounds(today);

    let mut tx = db.pool().begin().await?;

    sqlx::query(r#"INSERT INTO "profiles" ("userId") VALUES (?) ON CONFLICT ("userId") DO NOTHING"#)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    // Fold-and-credit: marking isCollected and crediting the profile happen
    // in the same transaction, so a replay cannot double-credit.
    let stale = sqlx::query(
        r#"
        SELECT "id", "coinsEarned" FROM "weekly_ledgers"
        WHERE "userId" = ? AND "weekStart" < ? AND "isCollected" = 0
        "#,
    )
    .bind(user_id)
    .bind(week_start)
    .fetch_all(&mut *tx)
    .await?;

    let mut pending: i64 = 0;
    for row in &stale {
        let ledger_id: String = row.try_get("id")?;
        pending += row.try_get::<i64, _>("coinsEarned").unwrap_or(0);
        sqlx::query(r#"UPDATE "weekly_ledgers" SET "isCollected" = 1 WHERE "id" = ?"#)
            .bind(&ledger_id)
            .execute(&mut *tx)
            .await?;
    }

    if pending > 0 {
        sqlx::query(r#"UPDATE "profiles" SET "coins" = "coins" + ? WHERE "userId" = ?"#)
            .bind(pending)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tracing::info!(user_id, coins = pending, "settled past-week coins");
    }

    sqlx::query(
        r#"
        INSERT INTO "weekly_ledgers" ("id", "userId", "weekStart", "weekEnd")
        VALUES (?, ?, ?, ?)
        ON CONFLICT ("userId", "weekStart") DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(week_start)
    .bind(week_end)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query(r#"SELECT * FROM "weekly_ledgers" WHERE "userId" = ? AND "weekStart" = ?"#)
        .bind(user_id)
        .bind(week_start)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(map_ledger(&row))
}

/// Bumps the week's saved/added word counter. Called by save and import
/// flows in the surrounding application.
pub async fn add_words_learned(db: &Database, user_id: &str, count: i64) -> Result<(), sqlx::Error> {
    add_words_learned_at(db, user_id, count, Utc::now().date_naive()).await
}

pub async fn add_words_learned_at(
    db: &Database,
    user_id: &str,
    count: i64,
    today: NaiveDate,
) -> Result<(), sqlx::Error> {
    let ledger = get_or_create_ledger_at(db, user_id, today).await?;
    sqlx::query(r#"UPDATE "weekly_ledgers" SET "wordsLearned" = "wordsLearned" + ? WHERE "id" = ?"#)
        .bind(count)
        .bind(&ledger.id)
        .execute(db.pool())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_starts_on_monday() {
        // 2025-01-06 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        assert_eq!(week_start_of(monday), monday);

        let thursday = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(week_start_of(thursday), monday);

        let sunday = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();
        assert_eq!(week_start_of(sunday), monday);
    }

    #[test]
    fn week_bounds_span_seven_days() {
        let (start, end) = week_bounds(NaiveDate::from_ymd_opt(2025, 1, 9).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 1, 12).unwrap());
    }
}
