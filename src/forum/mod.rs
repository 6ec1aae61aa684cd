//! Forum posts and comments.
//!
//! Creating content runs a fixed chain of checks, first failure wins:
//! banned, silenced (an expired silence is cleared and the chain carries
//! on), locked post (comments only), category eligibility by rank, empty
//! content.

pub mod categories;
pub mod moderation;
pub mod votes;

pub use categories::{
    categories_for, create_category, list_categories, rank_may_post_in, seed_default_categories,
};
pub use moderation::{
    ban, lock_post, pin_post, silence, unban, unlock_post, unpin_post, unsilence, SilenceDuration,
};
pub use votes::{cast_vote, VoteTally, VoteTarget};

use crate::error::{PortalError, PortalResult};
use crate::orm::{forum_categories, forum_comments, forum_posts, forum_votes, users};
use crate::privilege::Actor;
use chrono::Utc;
use moderation::{silence_status, SilenceStatus};
use sea_orm::{
    entity::*, query::*, ActiveValue::Set, Condition, ConnectionTrait, DatabaseConnection,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category_id: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category_id: Option<i32>,
    /// Substring of the title or content.
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommentThread {
    pub comment: forum_comments::Model,
    /// Direct replies, oldest first.
    pub replies: Vec<forum_comments::Model>,
}

#[derive(Debug, Clone)]
pub struct PostThread {
    pub post: forum_posts::Model,
    /// Top-level comments by score, then oldest first.
    pub comments: Vec<CommentThread>,
}

/// Ban and silence steps of the posting chain.
///
/// An expired silence is cleared here and the clear is kept even if a later
/// step fails.
pub(crate) async fn check_author_standing<C>(db: &C, actor: &Actor) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    let user = users::Entity::find_by_id(actor.user_id)
        .one(db)
        .await?
        .ok_or(PortalError::Unauthenticated)?;

    if user.is_banned {
        return Err(PortalError::Banned);
    }

    match silence_status(user.is_silenced, user.silence_until, Utc::now().naive_utc()) {
        SilenceStatus::Active(until) => Err(PortalError::Silenced(until)),
        SilenceStatus::Expired => {
            let mut user: users::ActiveModel = user.into();
            user.is_silenced = Set(false);
            user.silence_until = Set(None);
            user.update(db).await?;
            log::info!("Silence expired and cleared: user_id={}", actor.user_id);
            Ok(())
        }
        SilenceStatus::None => Ok(()),
    }
}

pub async fn find_post<C>(db: &C, post_id: i32) -> PortalResult<forum_posts::Model>
where
    C: ConnectionTrait,
{
    forum_posts::Entity::find_by_id(post_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Post"))
}

pub async fn create_post(
    db: &DatabaseConnection,
    actor: &Actor,
    form: NewPost,
) -> PortalResult<forum_posts::Model> {
    check_author_standing(db, actor).await?;

    let category = match form.category_id {
        Some(category_id) => Some(
            forum_categories::Entity::find_by_id(category_id)
                .one(db)
                .await?
                .ok_or(PortalError::NotFound("Category"))?,
        ),
        None => None,
    };
    categories::check_category(actor, category.as_ref(), &crate::app_config::forum())?;

    let title = form.title.trim();
    let content = form.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(PortalError::invalid("Title and content are required."));
    }

    let now = Utc::now().naive_utc();
    let post = forum_posts::ActiveModel {
        title: Set(title.to_owned()),
        content: Set(content.to_owned()),
        author_id: Set(actor.user_id),
        category_id: Set(form.category_id),
        upvotes: Set(0),
        downvotes: Set(0),
        score: Set(0),
        is_locked: Set(false),
        is_pinned: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::debug!("Post {} created by user {}", post.id, actor.user_id);
    Ok(post)
}

/// Adds a comment, or a reply when `parent_id` names a comment on the same post.
pub async fn create_comment(
    db: &DatabaseConnection,
    actor: &Actor,
    post_id: i32,
    content: &str,
    parent_id: Option<i32>,
) -> PortalResult<forum_comments::Model> {
    check_author_standing(db, actor).await?;

    let post = find_post(db, post_id).await?;
    if post.is_locked {
        return Err(PortalError::PostLocked);
    }

    if let Some(parent_id) = parent_id {
        let parent = forum_comments::Entity::find_by_id(parent_id)
            .one(db)
            .await?
            .ok_or(PortalError::NotFound("Comment"))?;
        if parent.post_id != post_id {
            return Err(PortalError::invalid("Reply must be on the same post."));
        }
    }

    let content = content.trim();
    if content.is_empty() {
        return Err(PortalError::invalid("Comment cannot be empty."));
    }

    let now = Utc::now().naive_utc();
    let comment = forum_comments::ActiveModel {
        content: Set(content.to_owned()),
        author_id: Set(actor.user_id),
        post_id: Set(post_id),
        parent_id: Set(parent_id),
        upvotes: Set(0),
        downvotes: Set(0),
        score: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::debug!(
        "Comment {} added to post {} by user {}",
        comment.id,
        post_id,
        actor.user_id
    );
    Ok(comment)
}

/// Pinned posts first, then by score, then newest.
pub async fn list_posts(
    db: &DatabaseConnection,
    filter: PostFilter,
) -> PortalResult<Vec<forum_posts::Model>> {
    let mut query = forum_posts::Entity::find();

    if let Some(category_id) = filter.category_id {
        query = query.filter(forum_posts::Column::CategoryId.eq(category_id));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(forum_posts::Column::Title.contains(search))
                .add(forum_posts::Column::Content.contains(search)),
        );
    }

    Ok(query
        .order_by_desc(forum_posts::Column::IsPinned)
        .order_by_desc(forum_posts::Column::Score)
        .order_by_desc(forum_posts::Column::CreatedAt)
        .order_by_desc(forum_posts::Column::Id)
        .limit(crate::app_config::forum().posts_per_page)
        .all(db)
        .await?)
}

pub async fn view_post(db: &DatabaseConnection, post_id: i32) -> PortalResult<PostThread> {
    let post = find_post(db, post_id).await?;

    let all = forum_comments::Entity::find()
        .filter(forum_comments::Column::PostId.eq(post_id))
        .order_by_asc(forum_comments::Column::CreatedAt)
        .order_by_asc(forum_comments::Column::Id)
        .all(db)
        .await?;

    let mut top_level = Vec::new();
    let mut replies: HashMap<i32, Vec<forum_comments::Model>> = HashMap::new();
    for comment in all {
        match comment.parent_id {
            Some(parent_id) => replies.entry(parent_id).or_default().push(comment),
            None => top_level.push(comment),
        }
    }
    // Stable sort keeps oldest first among equal scores.
    top_level.sort_by(|a, b| b.score.cmp(&a.score));

    let comments = top_level
        .into_iter()
        .map(|comment| CommentThread {
            replies: replies.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect();

    Ok(PostThread { post, comments })
}

/// Deletes a post with its comments and every vote on either. Author or admin.
pub async fn delete_post(db: &DatabaseConnection, actor: &Actor, post_id: i32) -> PortalResult<()> {
    let txn = db.begin().await?;
    let post = find_post(&txn, post_id).await?;

    if !actor.is(post.author_id) {
        actor.require_admin()?;
    }

    delete_post_cascade(&txn, post_id).await?;
    txn.commit().await?;

    log::info!("Post {} deleted by user {}", post_id, actor.user_id);
    Ok(())
}

pub(crate) async fn delete_post_cascade<C>(db: &C, post_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    let comment_ids: Vec<i32> = forum_comments::Entity::find()
        .filter(forum_comments::Column::PostId.eq(post_id))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    if !comment_ids.is_empty() {
        forum_votes::Entity::delete_many()
            .filter(forum_votes::Column::CommentId.is_in(comment_ids))
            .exec(db)
            .await?;
    }
    forum_votes::Entity::delete_many()
        .filter(forum_votes::Column::PostId.eq(post_id))
        .exec(db)
        .await?;
    forum_comments::Entity::delete_many()
        .filter(forum_comments::Column::PostId.eq(post_id))
        .exec(db)
        .await?;
    forum_posts::Entity::delete_by_id(post_id).exec(db).await?;
    Ok(())
}
