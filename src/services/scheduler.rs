use chrono::{Duration, NaiveDate};
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Reaching this much xp levels the item up and resets xp to 0.
pub const LEVEL_UP_XP: i64 = 4;
/// Xp lost on an incorrect answer.
const WRONG_PENALTY: i64 = 2;
/// Xp an item restarts at after dropping a level.
const DEMOTED_XP: i64 = 2;

/// Per-(user, word) spaced-repetition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub xp: i64,
    pub level: i64,
    pub next_review_date: NaiveDate,
}

impl ReviewState {
    /// State for an item answered for the first time: immediately due.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            xp: 0,
            level: 1,
            next_review_date: today,
        }
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_review_date <= today
    }
}

fn review_interval_days(level: i64) -> i64 {
    match level {
        ..=2 => 3,
        3 => 7,
        _ => 14,
    }
}

/// Folds one answer outcome into the state.
///
/// Correct: +1 xp; at 4 xp the item levels up, xp resets and the next review
/// moves out by a level-dependent interval. Incorrect: -2 xp; going negative
/// drops a level (restarting mid-level) or clamps to 0 at level 1, and the
/// item is due again tomorrow.
pub fn apply_outcome(prior: &ReviewState, is_correct: bool, today: NaiveDate) -> ReviewState {
    let mut next = *prior;

    if is_correct {
        next.xp += 1;
        if next.xp >= LEVEL_UP_XP {
            next.level += 1;
            next.xp = 0;
            next.next_review_date = today + Duration::days(review_interval_days(next.level));
        }
    } else {
        next.xp -= WRONG_PENALTY;
        if next.xp < 0 {
            if next.level > 1 {
                next.level -= 1;
                next.xp = DEMOTED_XP;
            } else {
                next.xp = 0;
            }
        }
        next.next_review_date = today + Duration::days(1);
    }

    next
}

/// One quizzable item from the user's candidate pool (own + saved words),
/// with its review date when a progress row exists.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub word_id: String,
    pub next_review_date: Option<NaiveDate>,
}

impl Candidate {
    fn is_due(&self, today: NaiveDate) -> bool {
        self.next_review_date.is_some_and(|date| date <= today)
    }
}

pub async fn load_candidates(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<Candidate>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT w."id" as "wordId", p."nextReviewDate" as "nextReviewDate"
        FROM "words" w
        LEFT JOIN "word_progress" p ON p."wordId" = w."id" AND p."userId" = ?
        WHERE w."authorId" = ?
           OR w."id" IN (SELECT "wordId" FROM "saved_words" WHERE "userId" = ?)
        ORDER BY w."id"
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Candidate {
            word_id: row.try_get("wordId").unwrap_or_default(),
            next_review_date: row.try_get("nextReviewDate").ok(),
        })
        .collect())
}

/// Soft due-first selection: a uniformly random due item when any exists,
/// otherwise a uniformly random candidate. No ordering among due items.
pub fn choose_candidate(candidates: &[Candidate], today: NaiveDate) -> Option<&Candidate> {
    let mut rng = rand::rng();
    let due: Vec<&Candidate> = candidates.iter().filter(|c| c.is_due(today)).collect();
    if !due.is_empty() {
        return due.choose(&mut rng).copied();
    }
    candidates.choose(&mut rng)
}

pub async fn pick_review_word(
    pool: &SqlitePool,
    user_id: &str,
    today: NaiveDate,
) -> Result<Option<String>, sqlx::Error> {
    let candidates = load_candidates(pool, user_id).await?;
    Ok(choose_candidate(&candidates, today).map(|c| c.word_id.clone()))
}

/// Uniform sampling with replacement, for game boards that need more slots
/// than the pool has words.
pub fn sample_with_replacement<T: Clone>(pool: &[T], count: usize) -> Vec<T> {
    if pool.is_empty() {
        return Vec::new();
    }
    let mut rng = rand::rng();
    (0..count)
        .map(|_| pool[rng.random_range(0..pool.len())].clone())
        .collect()
}

/// Word ids for a game board of `count` slots. Sampling is without
/// replacement while the pool is large enough, with replacement otherwise.
pub async fn select_game_words(
    pool: &SqlitePool,
    user_id: &str,
    count: usize,
) -> Result<Vec<String>, sqlx::Error> {
    let mut ids: Vec<String> = load_candidates(pool, user_id)
        .await?
        .into_iter()
        .map(|c| c.word_id)
        .collect();

    if ids.len() >= count {
        let mut rng = rand::rng();
        ids.shuffle(&mut rng);
        ids.truncate(count);
        Ok(ids)
    } else {
        Ok(sample_with_replacement(&ids, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn correct_answer_at_three_xp_levels_up() {
        let today = day(2025, 1, 6);
        let prior = ReviewState {
            xp: 3,
            level: 1,
            next_review_date: today,
        };
        let next = apply_outcome(&prior, true, today);
        assert_eq!(next.level, 2);
        assert_eq!(next.xp, 0);
        assert_eq!(next.next_review_date, day(2025, 1, 9));
    }

    #[test]
    fn incorrect_answer_drops_a_level_mid_xp() {
        let today = day(2025, 1, 6);
        let prior = ReviewState {
            xp: 0,
            level: 2,
            next_review_date: day(2025, 1, 9),
        };
        let next = apply_outcome(&prior, false, today);
        assert_eq!(next.level, 1);
        assert_eq!(next.xp, 2);
        assert_eq!(next.next_review_date, day(2025, 1, 7));
    }

    #[test]
    fn incorrect_answer_clamps_at_level_one() {
        let today = day(2025, 1, 6);
        let prior = ReviewState::new(today);
        let next = apply_outcome(&prior, false, today);
        assert_eq!(next.level, 1);
        assert_eq!(next.xp, 0);
        assert_eq!(next.next_review_date, day(2025, 1, 7));
    }

    #[test]
    fn incorrect_answer_overrides_future_due_date() {
        let today = day(2025, 1, 6);
        let prior = ReviewState {
            xp: 1,
            level: 4,
            next_review_date: day(2025, 2, 1),
        };
        let next = apply_outcome(&prior, false, today);
        assert_eq!(next.next_review_date, day(2025, 1, 7));
        assert_eq!(next.level, 4);
        assert_eq!(next.xp, 0);
    }

    #[test]
    fn review_intervals_grow_with_level() {
        let today = day(2025, 1, 6);
        let mut state = ReviewState {
            xp: 3,
            level: 2,
            next_review_date: today,
        };
        state = apply_outcome(&state, true, today);
        assert_eq!(state.level, 3);
        assert_eq!(state.next_review_date, today + Duration::days(7));

        state.xp = 3;
        state = apply_outcome(&state, true, today);
        assert_eq!(state.level, 4);
        assert_eq!(state.next_review_date, today + Duration::days(14));
    }

    #[test]
    fn due_candidates_win_over_new_ones() {
        let today = day(2025, 1, 6);
        let candidates = vec![
            Candidate {
                word_id: "new".into(),
                next_review_date: None,
            },
            Candidate {
                word_id: "due".into(),
                next_review_date: Some(day(2025, 1, 1)),
            },
            Candidate {
                word_id: "future".into(),
                next_review_date: Some(day(2025, 2, 1)),
            },
        ];
        for _ in 0..20 {
            let picked = choose_candidate(&candidates, today).unwrap();
            assert_eq!(picked.word_id, "due");
        }
    }

    #[test]
    fn selection_falls_back_to_the_full_pool() {
        let today = day(2025, 1, 6);
        let candidates = vec![
            Candidate {
                word_id: "a".into(),
                next_review_date: None,
            },
            Candidate {
                word_id: "b".into(),
                next_review_date: Some(day(2025, 2, 1)),
            },
        ];
        let picked = choose_candidate(&candidates, today).unwrap();
        assert!(picked.word_id == "a" || picked.word_id == "b");
        assert!(choose_candidate(&[], today).is_none());
    }

    #[test]
    fn sampling_with_replacement_fills_the_request() {
        let pool = vec!["a".to_string(), "b".to_string()];
        let sample = sample_with_replacement(&pool, 15);
        assert_eq!(sample.len(), 15);
        assert!(sample.iter().all(|id| pool.contains(id)));
        assert!(sample_with_replacement(&Vec::<String>::new(), 5).is_empty());
    }

    proptest! {
        #[test]
        fn xp_stays_in_window_and_level_never_drops_below_one(
            outcomes in proptest::collection::vec(any::<bool>(), 0..256)
        ) {
            let today = day(2025, 1, 6);
            let mut state = ReviewState::new(today);
            for is_correct in outcomes {
                let prior_level = state.level;
                state = apply_outcome(&state, is_correct, today);
                prop_assert!(state.xp >= 0);
                prop_assert!(state.xp < LEVEL_UP_XP);
                prop_assert!(state.level >= 1);
                if is_correct {
                    prop_assert!(state.level >= prior_level);
                }
            }
        }

        #[test]
        fn correct_streaks_follow_level_arithmetic(n in 0usize..128) {
            let today = day(2025, 1, 6);
            let mut state = ReviewState::new(today);
            for _ in 0..n {
                state = apply_outcome(&state, true, today);
            }
            prop_assert_eq!(state.level, 1 + (n as i64 - state.xp) / LEVEL_UP_XP);
        }
    }
}
