//! Coding platform leaderboard.
//!
//! Each user's total is the sum of their HackerRank, CodeChef and LeetCode
//! scores, a missing score counting as zero. Ranking is competition style:
//! equal totals share a rank and the next rank skips ahead.

use crate::error::{PortalError, PortalResult};
use crate::orm::platform_scores::{self, Platform};
use crate::orm::users;
use crate::privilege::Actor;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Order, SimpleExpr};
use sea_orm::{
    entity::*, query::*, ActiveValue::Set, DatabaseConnection, FromQueryResult, JoinType,
};

/// Highest score accepted for one platform. Three of these still sum
/// without overflowing an `i64`.
pub const MAX_PLATFORM_SCORE: i64 = i32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub rank: u64,
    pub user_id: i32,
    pub username: String,
    pub hackerrank: i64,
    pub codechef: i64,
    pub leetcode: i64,
    pub total: i64,
}

/// Records a user's score on a platform, replacing any previous one. Admin only.
pub async fn set_platform_score(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i32,
    platform: Platform,
    score: i64,
) -> PortalResult<platform_scores::Model> {
    actor.require_admin()?;
    if score < 0 {
        return Err(PortalError::invalid("Score cannot be negative."));
    }
    if score > MAX_PLATFORM_SCORE {
        return Err(PortalError::invalid("Score is too large."));
    }

    let txn = db.begin().await?;

    users::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(PortalError::NotFound("User"))?;

    let existing = platform_scores::Entity::find()
        .filter(platform_scores::Column::UserId.eq(user_id))
        .filter(platform_scores::Column::Platform.eq(platform))
        .one(&txn)
        .await?;

    let now = Utc::now().naive_utc();
    let row = match existing {
        Some(row) => {
            let mut row: platform_scores::ActiveModel = row.into();
            row.score = Set(score);
            row.updated_at = Set(now);
            row.update(&txn).await?
        }
        None => {
            platform_scores::ActiveModel {
                user_id: Set(user_id),
                platform: Set(platform),
                score: Set(score),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };
    txn.commit().await?;

    log::debug!("Score set: user_id={} {:?}={}", user_id, platform, score);
    Ok(row)
}

#[derive(Debug, FromQueryResult)]
struct RankedRow {
    rank: i64,
    user_id: i32,
    username: String,
    hackerrank: i64,
    codechef: i64,
    leetcode: i64,
    total: i64,
}

/// `SUM` over one platform's scores, zero when the user has none. The cast
/// keeps PostgreSQL from widening the sum to NUMERIC.
fn platform_sum(platform: Platform) -> SimpleExpr {
    Expr::cust(format!(
        "CAST(COALESCE(SUM(CASE WHEN platform_scores.platform = '{}' \
         THEN platform_scores.score END), 0) AS BIGINT)",
        platform.to_value()
    ))
}

const TOTAL_SQL: &str = "CAST(COALESCE(SUM(platform_scores.score), 0) AS BIGINT)";

/// One page of the leaderboard. Every user appears, with zero scores if none
/// are recorded. Equal totals share a rank and are listed oldest account
/// first.
pub async fn leaderboard(
    db: &DatabaseConnection,
    limit: usize,
    offset: usize,
) -> PortalResult<Vec<LeaderboardRow>> {
    let rows = users::Entity::find()
        .select_only()
        .column_as(
            Expr::cust(format!("RANK() OVER (ORDER BY {} DESC)", TOTAL_SQL)),
            "rank",
        )
        .column_as(users::Column::Id, "user_id")
        .column_as(users::Column::Username, "username")
        .column_as(platform_sum(Platform::HackerRank), "hackerrank")
        .column_as(platform_sum(Platform::CodeChef), "codechef")
        .column_as(platform_sum(Platform::LeetCode), "leetcode")
        .column_as(Expr::cust(TOTAL_SQL), "total")
        .join(JoinType::LeftJoin, platform_scores::Relation::User.def().rev())
        .group_by(users::Column::Id)
        .group_by(users::Column::Username)
        .order_by(Expr::cust(TOTAL_SQL), Order::Desc)
        .order_by_asc(users::Column::Id)
        .limit(limit as u64)
        .offset(offset as u64)
        .into_model::<RankedRow>()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|r| LeaderboardRow {
            rank: r.rank as u64,
            user_id: r.user_id,
            username: r.username,
            hackerrank: r.hackerrank,
            codechef: r.codechef,
            leetcode: r.leetcode,
            total: r.total,
        })
        .collect())
}
