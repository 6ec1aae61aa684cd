//! Forum moderation. Every action here is admin only and idempotent.

use crate::error::{PortalError, PortalResult};
use crate::orm::{forum_posts, users};
use crate::privilege::Actor;
use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceDuration {
    Days(u32),
    Permanent,
}

impl SilenceDuration {
    /// Zero days means permanent.
    pub fn from_days(days: u32) -> Self {
        if days == 0 {
            SilenceDuration::Permanent
        } else {
            SilenceDuration::Days(days)
        }
    }

    /// Expiry for a silence starting at `now`, None when permanent.
    pub fn expiry_from(self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            SilenceDuration::Days(0) | SilenceDuration::Permanent => None,
            SilenceDuration::Days(days) => Some(now + Duration::days(i64::from(days))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SilenceStatus {
    None,
    /// Still in force; carries the expiry, None when permanent.
    Active(Option<NaiveDateTime>),
    /// Flagged but past its expiry.
    Expired,
}

pub(crate) fn silence_status(
    is_silenced: bool,
    until: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> SilenceStatus {
    match (is_silenced, until) {
        (false, _) => SilenceStatus::None,
        (true, None) => SilenceStatus::Active(None),
        (true, Some(until)) if until > now => SilenceStatus::Active(Some(until)),
        (true, Some(_)) => SilenceStatus::Expired,
    }
}

async fn find_user(db: &DatabaseConnection, user_id: i32) -> PortalResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("User"))
}

fn refuse_self(actor: &Actor, user_id: i32, action: &str) -> PortalResult<()> {
    if actor.is(user_id) {
        return Err(PortalError::forbidden(format!("You cannot {} yourself.", action)));
    }
    Ok(())
}

pub async fn ban(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i32,
) -> PortalResult<users::Model> {
    actor.require_admin()?;
    refuse_self(actor, user_id, "ban")?;

    let user = find_user(db, user_id).await?;
    if user.is_banned {
        return Ok(user);
    }
    let mut user: users::ActiveModel = user.into();
    user.is_banned = Set(true);
    let user = user.update(db).await?;

    log::info!("User {} banned from the forum by {}", user.username, actor.user_id);
    Ok(user)
}

pub async fn unban(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i32,
) -> PortalResult<users::Model> {
    actor.require_admin()?;

    let user = find_user(db, user_id).await?;
    if !user.is_banned {
        return Ok(user);
    }
    let mut user: users::ActiveModel = user.into();
    user.is_banned = Set(false);
    let user = user.update(db).await?;

    log::info!("User {} unbanned by {}", user.username, actor.user_id);
    Ok(user)
}

/// Silences a user for a number of days or permanently. A new silence
/// replaces any previous expiry.
pub async fn silence(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i32,
    duration: SilenceDuration,
) -> PortalResult<users::Model> {
    actor.require_admin()?;
    refuse_self(actor, user_id, "silence")?;

    let user = find_user(db, user_id).await?;
    let until = duration.expiry_from(Utc::now().naive_utc());

    let mut user: users::ActiveModel = user.into();
    user.is_silenced = Set(true);
    user.silence_until = Set(until);
    let user = user.update(db).await?;

    match until {
        Some(until) => log::info!(
            "User {} silenced until {} by {}",
            user.username,
            until,
            actor.user_id
        ),
        None => log::info!(
            "User {} permanently silenced by {}",
            user.username,
            actor.user_id
        ),
    }
    Ok(user)
}

pub async fn unsilence(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i32,
) -> PortalResult<users::Model> {
    actor.require_admin()?;

    let user = find_user(db, user_id).await?;
    if !user.is_silenced && user.silence_until.is_none() {
        return Ok(user);
    }
    let mut user: users::ActiveModel = user.into();
    user.is_silenced = Set(false);
    user.silence_until = Set(None);
    let user = user.update(db).await?;

    log::info!("User {} unsilenced by {}", user.username, actor.user_id);
    Ok(user)
}

#[derive(Debug, Clone, Copy)]
enum PostFlag {
    Locked,
    Pinned,
}

async fn set_post_flag(
    db: &DatabaseConnection,
    actor: &Actor,
    post_id: i32,
    flag: PostFlag,
    value: bool,
) -> PortalResult<forum_posts::Model> {
    actor.require_admin()?;

    let post = super::find_post(db, post_id).await?;
    let current = match flag {
        PostFlag::Locked => post.is_locked,
        PostFlag::Pinned => post.is_pinned,
    };
    if current == value {
        return Ok(post);
    }

    let mut post: forum_posts::ActiveModel = post.into();
    match flag {
        PostFlag::Locked => post.is_locked = Set(value),
        PostFlag::Pinned => post.is_pinned = Set(value),
    }
    let post = post.update(db).await?;

    log::info!(
        "Post {} {:?} set to {} by {}",
        post.id,
        flag,
        value,
        actor.user_id
    );
    Ok(post)
}

pub async fn lock_post(
    db: &DatabaseConnection,
    actor: &Actor,
    post_id: i32,
) -> PortalResult<forum_posts::Model> {
    set_post_flag(db, actor, post_id, PostFlag::Locked, true).await
}

pub async fn unlock_post(
    db: &DatabaseConnection,
    actor: &Actor,
    post_id: i32,
) -> PortalResult<forum_posts::Model> {
    set_post_flag(db, actor, post_id, PostFlag::Locked, false).await
}

pub async fn pin_post(
    db: &DatabaseConnection,
    actor: &Actor,
    post_id: i32,
) -> PortalResult<forum_posts::Model> {
    set_post_flag(db, actor, post_id, PostFlag::Pinned, true).await
}

pub async fn unpin_post(
    db: &DatabaseConnection,
    actor: &Actor,
    post_id: i32,
) -> PortalResult<forum_posts::Model> {
    set_post_flag(db, actor, post_id, PostFlag::Pinned, false).await
}
