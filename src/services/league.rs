use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::db::Database;
use crate::models::League;
use crate::services::{profile, settlement};

/// Members promoted from / demoted out of each league per week.
const PROMOTION_ZONE: usize = 5;
const DEMOTION_ZONE: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueMember {
    pub user_id: String,
    pub username: String,
    pub weekly_xp: i64,
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueStandings {
    pub league: League,
    pub members: Vec<LeagueMember>,
    pub user_rank: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transition {
    pub user_id: String,
    pub to: League,
}

/// Ranks last week and applies promotions/demotions, once per week.
/// Safe to call opportunistically from any request; returns whether this
/// call performed the settlement.
pub async fn process_weekly_leagues(db: &Database) -> Result<bool, sqlx::Error> {
    process_leagues_at(db, Utc::now().date_naive()).await
}

pub async fn process_leagues_at(db: &Database, today: NaiveDate) -> Result<bool, sqlx::Error> {
    let last_week_start = settlement::week_start_of(today) - Duration::days(7);

    // Cheap presence check before taking the lock.
    if week_settled(db.pool(), last_week_start).await? {
        return Ok(false);
    }

    let _guard = db.settlement_guard().lock().await;

    let mut tx = db.pool().begin().await?;

    // Re-check under the lock: the loser of a race observes the log row and
    // exits without side effects.
    let settled = sqlx::query(r#"SELECT 1 FROM "league_settlement_log" WHERE "weekStart" = ?"#)
        .bind(last_week_start)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if settled {
        return Ok(false);
    }

    let ledger_rows = sqlx::query(
        r#"SELECT "userId", "xpEarned" FROM "weekly_ledgers" WHERE "weekStart" = ?"#,
    )
    .bind(last_week_start)
    .fetch_all(&mut *tx)
    .await?;

    if ledger_rows.is_empty() {
        // Idle week: still close the window so it is never revisited.
        write_settlement_log(&mut tx, last_week_start).await?;
        tx.commit().await?;
        tracing::info!(week_start = %last_week_start, "league week closed with no activity");
        return Ok(true);
    }

    let mut xp_by_user: HashMap<String, i64> = HashMap::with_capacity(ledger_rows.len());
    for row in &ledger_rows {
        let user_id: String = row.try_get("userId")?;
        xp_by_user.insert(user_id, row.try_get("xpEarned").unwrap_or(0));
    }

    // Load order fixes tie ranking; missing ledger rows read as zero xp.
    let profile_rows = sqlx::query(r#"SELECT "userId", "league" FROM "profiles" ORDER BY "userId""#)
        .fetch_all(&mut *tx)
        .await?;

    let mut groups: HashMap<League, Vec<(String, i64)>> = HashMap::new();
    for row in &profile_rows {
        let user_id: String = row.try_get("userId")?;
        let league = League::parse(&row.try_get::<String, _>("league")?);
        let xp = xp_by_user.get(&user_id).copied().unwrap_or(0);
        groups.entry(league).or_default().push((user_id, xp));
    }

    let mut transitions = Vec::new();
    for league in League::ALL {
        if let Some(members) = groups.get(&league) {
            transitions.extend(plan_group(league, members.clone()));
        }
    }

    for transition in &transitions {
        sqlx::query(r#"UPDATE "profiles" SET "league" = ? WHERE "userId" = ?"#)
            .bind(transition.to.as_str())
            .bind(&transition.user_id)
            .execute(&mut *tx)
            .await?;
    }

    write_settlement_log(&mut tx, last_week_start).await?;
    tx.commit().await?;

    tracing::info!(
        week_start = %last_week_start,
        transitions = transitions.len(),
        "league week settled"
    );
    Ok(true)
}

/// Plans promotions and demotions for one league group.
///
/// Members are stably sorted by weekly xp descending. The top 5 move up
/// when a higher league exists and their xp is positive. Demotion walks the
/// sorted tail, skipping anyone just promoted, and takes at most 5; groups
/// with fewer than 5 members are exempt entirely. A member is never both
/// promoted and demoted in the same run.
pub(crate) fn plan_group(league: League, mut members: Vec<(String, i64)>) -> Vec<Transition> {
    members.sort_by(|a, b| b.1.cmp(&a.1));

    let mut transitions = Vec::new();
    let mut promoted = vec![false; members.len()];

    if let Some(higher) = league.promoted() {
        for (index, (user_id, xp)) in members.iter().take(PROMOTION_ZONE).enumerate() {
            if *xp > 0 {
                promoted[index] = true;
                transitions.push(Transition {
                    user_id: user_id.clone(),
                    to: higher,
                });
            }
        }
    }

    if let Some(lower) = league.demoted() {
        if members.len() >= DEMOTION_ZONE {
            let mut demotions = 0;
            for index in (0..members.len()).rev() {
                if demotions == DEMOTION_ZONE {
                    break;
                }
                if promoted[index] {
                    continue;
                }
                transitions.push(Transition {
                    user_id: members[index].0.clone(),
                    to: lower,
                });
                demotions += 1;
            }
        }
    }

    transitions
}

/// League page view: opportunistically settles the past week, then returns
/// the caller's league ranked by the current week's xp.
pub async fn get_league_standings(
    db: &Database,
    user_id: &str,
) -> Result<LeagueStandings, sqlx::Error> {
    get_standings_at(db, user_id, Utc::now().date_naive()).await
}

pub async fn get_standings_at(
    db: &Database,
    user_id: &str,
    today: NaiveDate,
) -> Result<LeagueStandings, sqlx::Error> {
    process_leagues_at(db, today).await?;

    let record = profile::get_or_create(db.pool(), user_id).await?;
    let week_start = settlement::week_start_of(today);

    let rows = sqlx::query(
        r#"
        SELECT p."userId", u."username", COALESCE(l."xpEarned", 0) as "weeklyXp"
        FROM "profiles" p
        JOIN "users" u ON u."id" = p."userId"
        LEFT JOIN "weekly_ledgers" l ON l."userId" = p."userId" AND l."weekStart" = ?
        WHERE p."league" = ?
        ORDER BY p."userId"
        "#,
    )
    .bind(week_start)
    .bind(record.league.as_str())
    .fetch_all(db.pool())
    .await?;

    let mut members: Vec<LeagueMember> = rows
        .iter()
        .map(|row| LeagueMember {
            user_id: row.try_get("userId").unwrap_or_default(),
            username: row.try_get("username").unwrap_or_default(),
            weekly_xp: row.try_get("weeklyXp").unwrap_or(0),
            rank: 0,
        })
        .collect();

    members.sort_by(|a, b| b.weekly_xp.cmp(&a.weekly_xp));
    for (index, member) in members.iter_mut().enumerate() {
        member.rank = index as i64 + 1;
    }

    let user_rank = members
        .iter()
        .find(|member| member.user_id == user_id)
        .map(|member| member.rank);

    Ok(LeagueStandings {
        league: record.league,
        members,
        user_rank,
    })
}

async fn week_settled(pool: &SqlitePool, week_start: NaiveDate) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(r#"SELECT 1 FROM "league_settlement_log" WHERE "weekStart" = ?"#)
        .bind(week_start)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

async fn write_settlement_log(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    week_start: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"INSERT INTO "league_settlement_log" ("weekStart") VALUES (?)"#)
        .bind(week_start)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
