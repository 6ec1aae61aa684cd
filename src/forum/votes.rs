//! The vote ledger and the counters cached from it.
//!
//! One call is one transaction: lock the target row, change the caller's
//! ledger row, then recount both directions from the ledger and write
//! `upvotes`, `downvotes` and `score` together. The counters are never
//! adjusted from their previous values.

use crate::error::{PortalError, PortalResult};
use crate::orm::forum_votes::{self, VoteType};
use crate::orm::{forum_comments, forum_posts};
use crate::privilege::Actor;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ActiveValue::Set, ConnectionTrait, DatabaseConnection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Post(i32),
    Comment(i32),
}

impl VoteTarget {
    fn ledger_column(self) -> (forum_votes::Column, i32) {
        match self {
            VoteTarget::Post(id) => (forum_votes::Column::PostId, id),
            VoteTarget::Comment(id) => (forum_votes::Column::CommentId, id),
        }
    }
}

/// Counters after a vote, and the caller's standing vote if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub current: Option<VoteType>,
}

/// Votes on a post or comment.
///
/// No prior vote records one. Repeating the same direction removes it.
/// The opposite direction flips the existing row.
pub async fn cast_vote(
    db: &DatabaseConnection,
    actor: &Actor,
    target: VoteTarget,
    direction: VoteType,
) -> PortalResult<VoteTally> {
    let txn = db.begin().await?;

    lock_target(&txn, target).await?;

    let (column, target_id) = target.ledger_column();
    let existing = forum_votes::Entity::find()
        .filter(forum_votes::Column::UserId.eq(actor.user_id))
        .filter(column.eq(target_id))
        .one(&txn)
        .await?;

    let current = match existing {
        None => {
            let (post_id, comment_id) = match target {
                VoteTarget::Post(id) => (Some(id), None),
                VoteTarget::Comment(id) => (None, Some(id)),
            };
            forum_votes::ActiveModel {
                user_id: Set(actor.user_id),
                post_id: Set(post_id),
                comment_id: Set(comment_id),
                vote_type: Set(direction),
                created_at: Set(Utc::now().naive_utc()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            Some(direction)
        }
        Some(vote) if vote.vote_type == direction => {
            forum_votes::Entity::delete_by_id(vote.id).exec(&txn).await?;
            None
        }
        Some(vote) => {
            let mut vote: forum_votes::ActiveModel = vote.into();
            vote.vote_type = Set(direction);
            vote.update(&txn).await?;
            Some(direction)
        }
    };

    let (upvotes, downvotes, score) = recount(&txn, target).await?;
    txn.commit().await?;

    log::debug!(
        "Vote by user {} on {:?}: {:?} -> +{} -{}",
        actor.user_id,
        target,
        current,
        upvotes,
        downvotes
    );
    Ok(VoteTally {
        upvotes,
        downvotes,
        score,
        current,
    })
}

/// Takes the target's row lock with a no-op update. Missing target is `NotFound`.
async fn lock_target<C>(db: &C, target: VoteTarget) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    let rows = match target {
        VoteTarget::Post(id) => {
            forum_posts::Entity::update_many()
                .col_expr(
                    forum_posts::Column::Upvotes,
                    Expr::col(forum_posts::Column::Upvotes).into(),
                )
                .filter(forum_posts::Column::Id.eq(id))
                .exec(db)
                .await?
                .rows_affected
        }
        VoteTarget::Comment(id) => {
            forum_comments::Entity::update_many()
                .col_expr(
                    forum_comments::Column::Upvotes,
                    Expr::col(forum_comments::Column::Upvotes).into(),
                )
                .filter(forum_comments::Column::Id.eq(id))
                .exec(db)
                .await?
                .rows_affected
        }
    };

    if rows == 0 {
        return Err(match target {
            VoteTarget::Post(_) => PortalError::NotFound("Post"),
            VoteTarget::Comment(_) => PortalError::NotFound("Comment"),
        });
    }
    Ok(())
}

/// Rewrites a target's counters from the ledger. Returns (upvotes, downvotes, score).
pub(crate) async fn recount<C>(db: &C, target: VoteTarget) -> PortalResult<(i32, i32, i32)>
where
    C: ConnectionTrait,
{
    let upvotes = count_votes(db, target, VoteType::Upvote).await?;
    let downvotes = count_votes(db, target, VoteType::Downvote).await?;
    let score = upvotes - downvotes;
    write_counters(db, target, upvotes, downvotes, score).await?;
    Ok((upvotes, downvotes, score))
}

async fn count_votes<C>(db: &C, target: VoteTarget, direction: VoteType) -> PortalResult<i32>
where
    C: ConnectionTrait,
{
    let (column, target_id) = target.ledger_column();
    let n = forum_votes::Entity::find()
        .filter(column.eq(target_id))
        .filter(forum_votes::Column::VoteType.eq(direction))
        .count(db)
        .await?;
    i32::try_from(n).map_err(|_| PortalError::invalid("vote count out of range"))
}

async fn write_counters<C>(
    db: &C,
    target: VoteTarget,
    upvotes: i32,
    downvotes: i32,
    score: i32,
) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    match target {
        VoteTarget::Post(id) => {
            forum_posts::Entity::update_many()
                .col_expr(forum_posts::Column::Upvotes, Expr::value(upvotes))
                .col_expr(forum_posts::Column::Downvotes, Expr::value(downvotes))
                .col_expr(forum_posts::Column::Score, Expr::value(score))
                .filter(forum_posts::Column::Id.eq(id))
                .exec(db)
                .await?;
        }
        VoteTarget::Comment(id) => {
            forum_comments::Entity::update_many()
                .col_expr(forum_comments::Column::Upvotes, Expr::value(upvotes))
                .col_expr(forum_comments::Column::Downvotes, Expr::value(downvotes))
                .col_expr(forum_comments::Column::Score, Expr::value(score))
                .filter(forum_comments::Column::Id.eq(id))
                .exec(db)
                .await?;
        }
    }
    Ok(())
}

/// The actor's standing vote on a target, if any.
pub async fn vote_of(
    db: &DatabaseConnection,
    actor: &Actor,
    target: VoteTarget,
) -> PortalResult<Option<VoteType>> {
    let (column, target_id) = target.ledger_column();
    Ok(forum_votes::Entity::find()
        .filter(forum_votes::Column::UserId.eq(actor.user_id))
        .filter(column.eq(target_id))
        .one(db)
        .await?
        .map(|v| v.vote_type))
}
