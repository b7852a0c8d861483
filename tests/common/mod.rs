#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use kotoba_progress::services::profile;
use kotoba_progress::{Database, League};
use sqlx::Row;
use uuid::Uuid;

pub async fn test_db() -> Database {
    Database::in_memory().await.expect("in-memory database")
}

pub async fn create_user(db: &Database, id: &str) {
    sqlx::query(r#"INSERT INTO "users" ("id", "username") VALUES (?, ?)"#)
        .bind(id)
        .bind(id)
        .execute(db.pool())
        .await
        .expect("insert user");
}

pub async fn create_system_word(db: &Database, id: &str) {
    sqlx::query(r#"INSERT INTO "words" ("id", "term", "meaning") VALUES (?, ?, ?)"#)
        .bind(id)
        .bind(format!("term-{id}"))
        .bind(format!("meaning-{id}"))
        .execute(db.pool())
        .await
        .expect("insert system word");
}

pub async fn create_user_word(db: &Database, id: &str, author_id: &str) {
    sqlx::query(r#"INSERT INTO "words" ("id", "term", "meaning", "authorId") VALUES (?, ?, ?, ?)"#)
        .bind(id)
        .bind(format!("term-{id}"))
        .bind(format!("meaning-{id}"))
        .bind(author_id)
        .execute(db.pool())
        .await
        .expect("insert user word");
}

pub async fn save_word(db: &Database, user_id: &str, word_id: &str) {
    sqlx::query(r#"INSERT INTO "saved_words" ("userId", "wordId") VALUES (?, ?)"#)
        .bind(user_id)
        .bind(word_id)
        .execute(db.pool())
        .await
        .expect("save word");
}

pub async fn insert_ledger(
    db: &Database,
    user_id: &str,
    week_start: NaiveDate,
    coins_earned: i64,
    xp_earned: i64,
    is_collected: bool,
) {
    sqlx::query(
        r#"
        INSERT INTO "weekly_ledgers"
            ("id", "userId", "weekStart", "weekEnd", "coinsEarned", "xpEarned", "isCollected")
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(week_start)
    .bind(week_start + Duration::days(6))
    .bind(coins_earned)
    .bind(xp_earned)
    .bind(is_collected)
    .execute(db.pool())
    .await
    .expect("insert ledger");
}

pub async fn set_league(db: &Database, user_id: &str, league: League) {
    profile::get_or_create(db.pool(), user_id)
        .await
        .expect("create profile");
    sqlx::query(r#"UPDATE "profiles" SET "league" = ? WHERE "userId" = ?"#)
        .bind(league.as_str())
        .bind(user_id)
        .execute(db.pool())
        .await
        .expect("set league");
}

pub async fn coins_of(db: &Database, user_id: &str) -> i64 {
    profile::get(db.pool(), user_id)
        .await
        .expect("load profile")
        .map(|p| p.coins)
        .unwrap_or(0)
}

pub async fn league_of(db: &Database, user_id: &str) -> League {
    profile::get(db.pool(), user_id)
        .await
        .expect("load profile")
        .map(|p| p.league)
        .expect("profile exists")
}

pub async fn ledger_collected(db: &Database, user_id: &str, week_start: NaiveDate) -> bool {
    sqlx::query(r#"SELECT "isCollected" FROM "weekly_ledgers" WHERE "userId" = ? AND "weekStart" = ?"#)
        .bind(user_id)
        .bind(week_start)
        .fetch_one(db.pool())
        .await
        .expect("load ledger")
        .try_get("isCollected")
        .expect("isCollected column")
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
