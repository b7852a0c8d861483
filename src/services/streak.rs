use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::db::Database;
use crate::services::profile;

pub const TREE_HEALTHY: i64 = 1;
pub const TREE_WITHERED: i64 = 3;

/// Three game types, capped at 3 points each per day.
pub const DAILY_GOAL: i64 = 9;
const GAME_CAP: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    Test,
    Match,
    Write,
}

impl GameKind {
    fn column(&self) -> &'static str {
        match self {
            GameKind::Test => "dailyTestCount",
            GameKind::Match => "dailyMatchCount",
            GameKind::Write => "dailyWriteCount",
        }
    }
}

/// Run on every authenticated page load: rolls the daily counters over on a
/// new day and withers the tree when a full day was missed.
pub async fn check_daily_progress(db: &Database, user_id: &str) -> Result<(), sqlx::Error> {
    check_daily_progress_at(db, user_id, Utc::now().date_naive()).await
}

pub async fn check_daily_progress_at(
    db: &Database,
    user_id: &str,
    today: NaiveDate,
) -> Result<(), sqlx::Error> {
    let record = profile::get_or_create(db.pool(), user_id).await?;

    if record.last_game_date != Some(today) {
        reset_daily_counters(db.pool(), user_id, None).await?;
    }

    let yesterday = today - Duration::days(1);
    if record
        .last_login_date
        .is_some_and(|last_login| last_login < yesterday)
    {
        sqlx::query(
            r#"UPDATE "profiles" SET "streak" = 0, "treeState" = ? WHERE "userId" = ?"#,
        )
        .bind(TREE_WITHERED)
        .bind(user_id)
        .execute(db.pool())
        .await?;
        tracing::info!(user_id, "streak broken, tree withered");
    }

    Ok(())
}

/// What one scored game did to the day's progress. The streak extension is
/// reported here because it is one-shot: once it fires, `lastLoginDate` is
/// today and a later check returns `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// The point counted toward today's goal (the per-game cap was not hit).
    pub counted: bool,
    /// This point completed the day and extended the streak.
    pub streak_extended: bool,
}

/// Run after a scored game result. Rolls the counters to the new day, then
/// awards the daily point for this game type unless its cap of 3 is already
/// reached (the cap keeps the exact-9 streak check reachable).
pub async fn register_game_score(
    db: &Database,
    user_id: &str,
    game: GameKind,
) -> Result<ScoreOutcome, sqlx::Error> {
    register_game_score_at(db, user_id, game, Utc::now().date_naive()).await
}

pub async fn register_game_score_at(
    db: &Database,
    user_id: &str,
    game: GameKind,
    today: NaiveDate,
) -> Result<ScoreOutcome, sqlx::Error> {
    let record = profile::get_or_create(db.pool(), user_id).await?;

    let mut current = match game {
        GameKind::Test => record.daily_test_count,
        GameKind::Match => record.daily_match_count,
        GameKind::Write => record.daily_write_count,
    };

    if record.last_game_date != Some(today) {
        reset_daily_counters(db.pool(), user_id, Some(today)).await?;
        current = 0;
    }

    if current >= GAME_CAP {
        return Ok(ScoreOutcome {
            counted: false,
            streak_extended: false,
        });
    }

    let query = format!(
        r#"UPDATE "profiles" SET "{col}" = "{col}" + 1 WHERE "userId" = ?"#,
        col = game.column()
    );
    sqlx::query(&query).bind(user_id).execute(db.pool()).await?;

    let streak_extended = check_streak_update_at(db, user_id, today).await?;
    Ok(ScoreOutcome {
        counted: true,
        streak_extended,
    })
}

/// Registers a streak day when all three daily counters are full (exactly 9)
/// and today has not been counted yet.
pub async fn check_streak_update(db: &Database, user_id: &str) -> Result<bool, sqlx::Error> {
    check_streak_update_at(db, user_id, Utc::now().date_naive()).await
}

pub async fn check_streak_update_at(
    db: &Database,
    user_id: &str,
    today: NaiveDate,
) -> Result<bool, sqlx::Error> {
    let record = profile::get_or_create(db.pool(), user_id).await?;

    if record.total_daily_progress() != DAILY_GOAL || record.last_login_date == Some(today) {
        return Ok(false);
    }

    sqlx::query(
        r#"
        UPDATE "profiles" SET
            "streak" = "streak" + 1,
            "treeState" = ?,
            "lastLoginDate" = ?
        WHERE "userId" = ?
        "#,
    )
    .bind(TREE_HEALTHY)
    .bind(today)
    .bind(user_id)
    .execute(db.pool())
    .await?;

    tracing::info!(user_id, streak = record.streak + 1, "daily goal reached");
    Ok(true)
}

async fn reset_daily_counters(
    pool: &SqlitePool,
    user_id: &str,
    new_game_date: Option<NaiveDate>,
) -> Result<(), sqlx::Error> {
    match new_game_date {
        Some(date) => {
            sqlx::query(
                r#"
                UPDATE "profiles" SET
                    "dailyTestCount" = 0,
                    "dailyMatchCount" = 0,
                    "dailyWriteCount" = 0,
                    "lastGameDate" = ?
                WHERE "userId" = ?
                "#,
            )
            .bind(date)
            .bind(user_id)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                UPDATE "profiles" SET
                    "dailyTestCount" = 0,
                    "dailyMatchCount" = 0,
                    "dailyWriteCount" = 0
                WHERE "userId" = ?
                "#,
            )
            .bind(user_id)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}
