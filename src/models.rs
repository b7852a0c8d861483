use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Competitive tier, ordered Bronze < Silver < Gold < Platinum < Diamond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum League {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl League {
    pub const ALL: [League; 5] = [
        League::Bronze,
        League::Silver,
        League::Gold,
        League::Platinum,
        League::Diamond,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            League::Bronze => "Bronze",
            League::Silver => "Silver",
            League::Gold => "Gold",
            League::Platinum => "Platinum",
            League::Diamond => "Diamond",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Silver" => League::Silver,
            "Gold" => League::Gold,
            "Platinum" => League::Platinum,
            "Diamond" => League::Diamond,
            _ => League::Bronze,
        }
    }

    /// Next-higher tier, or `None` at the top.
    pub fn promoted(&self) -> Option<League> {
        match self {
            League::Bronze => Some(League::Silver),
            League::Silver => Some(League::Gold),
            League::Gold => Some(League::Platinum),
            League::Platinum => Some(League::Diamond),
            League::Diamond => None,
        }
    }

    /// Next-lower tier, or `None` at the bottom.
    pub fn demoted(&self) -> Option<League> {
        match self {
            League::Bronze => None,
            League::Silver => Some(League::Bronze),
            League::Gold => Some(League::Silver),
            League::Platinum => Some(League::Gold),
            League::Diamond => Some(League::Platinum),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub coins: i64,
    pub league: League,
    pub streak: i64,
    pub tree_state: i64,
    pub daily_test_count: i64,
    pub daily_match_count: i64,
    pub daily_write_count: i64,
    pub last_game_date: Option<NaiveDate>,
    pub last_login_date: Option<NaiveDate>,
}

impl Profile {
    pub fn total_daily_progress(&self) -> i64 {
        self.daily_test_count + self.daily_match_count + self.daily_write_count
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyLedger {
    pub id: String,
    pub user_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub words_learned: i64,
    pub games_played: i64,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub coins_earned: i64,
    pub xp_earned: i64,
    pub is_collected: bool,
}

impl WeeklyLedger {
    /// Whole-percent accuracy over the week's counters.
    pub fn accuracy(&self) -> i64 {
        if self.total_questions > 0 {
            self.correct_answers * 100 / self.total_questions
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: String,
    pub user_id: String,
    pub word_id: String,
    pub xp: i64,
    pub level: i64,
    pub next_review_date: NaiveDate,
}

pub(crate) fn map_profile(row: &SqliteRow) -> Profile {
    let league: String = row.try_get("league").unwrap_or_default();
    Profile {
        user_id: row.try_get("userId").unwrap_or_default(),
        coins: row.try_get("coins").unwrap_or(0),
        league: League::parse(&league),
        streak: row.try_get("streak").unwrap_or(0),
        tree_state: row.try_get("treeState").unwrap_or(1),
        daily_test_count: row.try_get("dailyTestCount").unwrap_or(0),
        daily_match_count: row.try_get("dailyMatchCount").unwrap_or(0),
        daily_write_count: row.try_get("dailyWriteCount").unwrap_or(0),
        last_game_date: row.try_get("lastGameDate").ok(),
        last_login_date: row.try_get("lastLoginDate").ok(),
    }
}

pub(crate) fn map_ledger(row: &SqliteRow) -> WeeklyLedger {
    WeeklyLedger {
        id: row.try_get("id").unwrap_or_default(),
        user_id: row.try_get("userId").unwrap_or_default(),
        week_start: row.try_get("weekStart").unwrap_or_default(),
        week_end: row.try_get("weekEnd").unwrap_or_default(),
        words_learned: row.try_get("wordsLearned").unwrap_or(0),
        games_played: row.try_get("gamesPlayed").unwrap_or(0),
        correct_answers: row.try_get("correctAnswers").unwrap_or(0),
        total_questions: row.try_get("totalQuestions").unwrap_or(0),
        coins_earned: row.try_get("coinsEarned").unwrap_or(0),
        xp_earned: row.try_get("xpEarned").unwrap_or(0),
        is_collected: row.try_get("isCollected").unwrap_or(false),
    }
}

pub(crate) fn map_progress(row: &SqliteRow) -> ProgressRecord {
    ProgressRecord {
        id: row.try_get("id").unwrap_or_default(),
        user_id: row.try_get("userId").unwrap_or_default(),
        word_id: row.try_get("wordId").unwrap_or_default(),
        xp: row.try_get("xp").unwrap_or(0),
        level: row.try_get("level").unwrap_or(1),
        next_review_date: row.try_get("nextReviewDate").unwrap_or_default(),
    }
}
