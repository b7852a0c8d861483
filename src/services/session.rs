use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use thiserror::Error;
use uuid::Uuid;

use crate::db::Database;
use crate::models::{map_progress, ProgressRecord};
use crate::services::scheduler::{self, ReviewState};
use crate::services::settlement;

/// Weekly xp movement per answer. The weekly total never goes below zero.
const XP_PER_CORRECT: i64 = 2;
const XP_PER_WRONG: i64 = -1;

/// Minimum session accuracy for the coin credit.
const COIN_ACCURACY_THRESHOLD: f64 = 0.6;
/// Answers an unlimited ("infinite") session must exceed to earn coins.
const INFINITE_MODE_FLOOR: u32 = 30;

/// Caller-owned, per-game-session state. The core is stateless between
/// calls; request handlers keep this next to their own session data and
/// pass it back in for every answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Declared question limit; `None` is infinite mode.
    pub limit: Option<u32>,
    pub total_questions: u32,
    pub correct: u32,
    pub wrong: u32,
    /// Coins earned so far on system-authored words; credited to the ledger
    /// only if the session ends eligible.
    pub potential_coins: i64,
}

impl SessionState {
    pub fn with_limit(limit: Option<u32>) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.correct) / f64::from(self.total_questions)
    }

    /// Whether the session ran long enough for a coin credit: the declared
    /// limit was reached, or more than 30 answers in infinite mode.
    pub fn reached_goal(&self) -> bool {
        match self.limit {
            Some(limit) => self.total_questions >= limit,
            None => self.total_questions > INFINITE_MODE_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettlement {
    pub eligible: bool,
    pub coins_awarded: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown word: {0}")]
    UnknownWord(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

/// Records one answer: advances the word's spaced-repetition state, bumps
/// the current week's accuracy counters unconditionally, and accumulates
/// potential coins for correct answers on system-authored words.
pub async fn record_answer(
    db: &Database,
    session: &mut SessionState,
    user_id: &str,
    word_id: &str,
    is_correct: bool,
) -> Result<ProgressRecord, SessionError> {
    record_answer_at(db, session, user_id, word_id, is_correct, Utc::now().date_naive()).await
}

pub async fn record_answer_at(
    db: &Database,
    session: &mut SessionState,
    user_id: &str,
    word_id: &str,
    is_correct: bool,
    today: NaiveDate,
) -> Result<ProgressRecord, SessionError> {
    let ledger = settlement::get_or_create_ledger_at(db, user_id, today).await?;

    let mut tx = db.pool().begin().await?;

    let word_row = sqlx::query(r#"SELECT "authorId" FROM "words" WHERE "id" = ?"#)
        .bind(word_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| SessionError::UnknownWord(word_id.to_string()))?;
    let system_authored = word_row.try_get::<Option<String>, _>("authorId")?.is_none();

    let prior = sqlx::query(
        r#"SELECT * FROM "word_progress" WHERE "userId" = ? AND "wordId" = ?"#,
    )
    .bind(user_id)
    .bind(word_id)
    .fetch_optional(&mut *tx)
    .await?;

    let prior_state = prior
        .as_ref()
        .map(|row| {
            let record = map_progress(row);
            ReviewState {
                xp: record.xp,
                level: record.level,
                next_review_date: record.next_review_date,
            }
        })
        .unwrap_or_else(|| ReviewState::new(today));

    let next = scheduler::apply_outcome(&prior_state, is_correct, today);

    let row = sqlx::query(
        r#"
        INSERT INTO "word_progress" ("id", "userId", "wordId", "xp", "level", "nextReviewDate")
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT ("userId", "wordId") DO UPDATE SET
            "xp" = excluded."xp",
            "level" = excluded."level",
            "nextReviewDate" = excluded."nextReviewDate"
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(word_id)
    .bind(next.xp)
    .bind(next.level)
    .bind(next.next_review_date)
    .fetch_one(&mut *tx)
    .await?;

    let xp_delta = if is_correct { XP_PER_CORRECT } else { XP_PER_WRONG };
    sqlx::query(
        r#"
        UPDATE "weekly_ledgers" SET
            "totalQuestions" = "totalQuestions" + 1,
            "correctAnswers" = "correctAnswers" + ?,
            "xpEarned" = MAX(0, "xpEarned" + ?)
        WHERE "id" = ?
        "#,
    )
    .bind(if is_correct { 1 } else { 0 })
    .bind(xp_delta)
    .bind(&ledger.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    session.total_questions += 1;
    if is_correct {
        session.correct += 1;
        if system_authored {
            session.potential_coins += 1;
        }
    } else {
        session.wrong += 1;
    }

    Ok(map_progress(&row))
}

/// Closes a session: any non-empty session counts as a played game, but the
/// accumulated potential coins are credited only when accuracy and length
/// clear the bar.
pub async fn settle_session(
    db: &Database,
    session: &SessionState,
    user_id: &str,
) -> Result<SessionSettlement, sqlx::Error> {
    settle_session_at(db, session, user_id, Utc::now().date_naive()).await
}

pub async fn settle_session_at(
    db: &Database,
    session: &SessionState,
    user_id: &str,
    today: NaiveDate,
) -> Result<SessionSettlement, sqlx::Error> {
    if session.total_questions == 0 {
        return Ok(SessionSettlement {
            eligible: false,
            coins_awarded: 0,
        });
    }

    let ledger = settlement::get_or_create_ledger_at(db, user_id, today).await?;

    let eligible = session.accuracy() >= COIN_ACCURACY_THRESHOLD && session.reached_goal();
    let coins_awarded = if eligible { session.potential_coins } else { 0 };

    sqlx::query(
        r#"
        UPDATE "weekly_ledgers" SET
            "gamesPlayed" = "gamesPlayed" + 1,
            "coinsEarned" = "coinsEarned" + ?
        WHERE "id" = ?
        "#,
    )
    .bind(coins_awarded)
    .bind(&ledger.id)
    .execute(db.pool())
    .await?;

    tracing::debug!(
        user_id,
        eligible,
        coins_awarded,
        accuracy = session.accuracy(),
        "session settled"
    );

    Ok(SessionSettlement {
        eligible,
        coins_awarded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_handles_empty_sessions() {
        let session = SessionState::default();
        assert_eq!(session.accuracy(), 0.0);
    }

    #[test]
    fn declared_limit_must_be_reached() {
        let mut session = SessionState::with_limit(Some(10));
        session.total_questions = 9;
        assert!(!session.reached_goal());
        session.total_questions = 10;
        assert!(session.reached_goal());
    }

    #[test]
    fn infinite_mode_needs_more_than_thirty_answers() {
        let mut session = SessionState::with_limit(None);
        session.total_questions = 30;
        assert!(!session.reached_goal());
        session.total_questions = 31;
        assert!(session.reached_goal());
    }
}
