//! Profiles, user search and admin account management.

use crate::create_user::{validate_mobile, validate_password};
use crate::error::{PortalError, PortalResult};
use crate::forum::votes::recount;
use crate::forum::{delete_post_cascade, VoteTarget};
use crate::orm::{
    clubs, direct_messages, events, forum_comments, forum_posts, forum_votes, platform_scores,
    projects, registrations, sessions, student_chapters, team_invites, team_join_requests,
    team_members, team_messages, teams, users,
};
use crate::privilege::{Actor, Rank};
use crate::session::hash_password;
use crate::team::{delete_team_cascade, release_seat};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    entity::*, query::*, ActiveValue::Set, Condition, ConnectionTrait, DatabaseConnection, DbErr,
};

/// Most results a search returns.
pub const SEARCH_LIMIT: u64 = 50;

/// Self-service profile changes. None leaves a field alone, an empty string
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub roll_number: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<String>,
    pub college: Option<String>,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub codechef: Option<String>,
    pub hackerrank: Option<String>,
    pub leetcode: Option<String>,
    pub resume_filename: Option<String>,
    pub certificates_filename: Option<String>,
}

/// Changes an admin may make to any account.
#[derive(Debug, Clone, Default)]
pub struct AdminUserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub mobile: Option<String>,
    pub roll_number: Option<String>,
    pub college: Option<String>,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub skills: Option<String>,
    pub codechef: Option<String>,
    pub hackerrank: Option<String>,
    pub leetcode: Option<String>,
    pub is_admin: Option<bool>,
    pub privilege_level: Option<i32>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub user_count: u64,
    pub project_count: u64,
    pub event_count: u64,
    pub team_count: u64,
    pub club_count: u64,
    pub chapter_count: u64,
    pub recent_users: Vec<users::Model>,
}

fn optional(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

fn required(value: String, field: &str) -> PortalResult<String> {
    optional(value).ok_or_else(|| PortalError::invalid(format!("{} cannot be empty.", field)))
}

fn checked_mobile(mobile: String) -> PortalResult<Option<String>> {
    let mobile = optional(mobile);
    if let Some(m) = &mobile {
        validate_mobile(m).map_err(|_| PortalError::invalid("Mobile number must be 10 digits."))?;
    }
    Ok(mobile)
}

fn taken(e: DbErr) -> PortalError {
    if PortalError::is_unique_violation(&e) {
        PortalError::invalid("Email or username already in use.")
    } else {
        e.into()
    }
}

pub async fn get_user(db: &DatabaseConnection, user_id: i32) -> PortalResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("User"))
}

/// Edits the actor's own profile.
pub async fn update_profile(
    db: &DatabaseConnection,
    actor: &Actor,
    update: ProfileUpdate,
) -> PortalResult<users::Model> {
    let user = get_user(db, actor.user_id).await?;
    let mut user: users::ActiveModel = user.into();

    if let Some(name) = update.name {
        user.name = Set(required(name, "Name")?);
    }
    if let Some(mobile) = update.mobile {
        user.mobile = Set(checked_mobile(mobile)?);
    }
    macro_rules! apply {
        ($($field:ident),*) => {
            $(if let Some(v) = update.$field {
                user.$field = Set(optional(v));
            })*
        };
    }
    apply!(
        roll_number,
        bio,
        skills,
        college,
        branch,
        year,
        codechef,
        hackerrank,
        leetcode,
        resume_filename,
        certificates_filename
    );

    let user = user.update(db).await?;
    log::debug!("Profile updated: user_id={}", user.id);
    Ok(user)
}

/// Case-insensitive match on name, username or skills, by name.
pub async fn search_users(db: &DatabaseConnection, query: &str) -> PortalResult<Vec<users::Model>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let pattern = format!("%{}%", query.to_lowercase());

    let lower_like =
        |col: users::Column| Expr::expr(Func::lower(Expr::col(col))).like(pattern.as_str());

    Ok(users::Entity::find()
        .filter(
            Condition::any()
                .add(lower_like(users::Column::Name))
                .add(lower_like(users::Column::Username))
                .add(lower_like(users::Column::Skills)),
        )
        .order_by_asc(users::Column::Name)
        .limit(SEARCH_LIMIT)
        .all(db)
        .await?)
}

/// All accounts, newest first. Admin only.
pub async fn list_users(db: &DatabaseConnection, actor: &Actor) -> PortalResult<Vec<users::Model>> {
    actor.require_admin()?;
    Ok(users::Entity::find()
        .order_by_desc(users::Column::CreatedAt)
        .order_by_desc(users::Column::Id)
        .all(db)
        .await?)
}

/// Applies an admin's edit to an account.
///
/// Rank and admin flag are separate columns and are handled separately:
/// - an `is_admin` change is ignored when the target is the actor;
/// - a new level is applied unless the actor is demoting themselves;
/// - level 1 turns the flag on;
/// - a level above 1 clears the flag only if the actor has no flag.
pub async fn admin_edit_user(
    db: &DatabaseConnection,
    actor: &Actor,
    target_id: i32,
    update: AdminUserUpdate,
) -> PortalResult<users::Model> {
    actor.require_admin()?;
    let target = get_user(db, target_id).await?;
    let editing_self = actor.is(target_id);

    let new_password = match update.password.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => {
            validate_password(p).map_err(|_| {
                PortalError::invalid(
                    "Password must be at least 8 chars incl. upper, lower, number & special char.",
                )
            })?;
            Some(hash_password(p)?)
        }
        _ => None,
    };

    let mut user: users::ActiveModel = target.into();

    if let Some(name) = update.name {
        user.name = Set(required(name, "Name")?);
    }
    if let Some(email) = update.email {
        user.email = Set(required(email, "Email")?);
    }
    if let Some(username) = update.username {
        user.username = Set(required(username, "Username")?);
    }
    if let Some(mobile) = update.mobile {
        user.mobile = Set(checked_mobile(mobile)?);
    }
    macro_rules! apply {
        ($($field:ident),*) => {
            $(if let Some(v) = update.$field {
                user.$field = Set(optional(v));
            })*
        };
    }
    apply!(roll_number, college, branch, year, skills, codechef, hackerrank, leetcode);

    if let Some(is_admin) = update.is_admin {
        if !editing_self {
            user.is_admin = Set(is_admin);
        }
    }

    if let Some(level) = update.privilege_level {
        let rank = Rank::from_level(level)
            .ok_or_else(|| PortalError::invalid("Privilege level must be between 1 and 4."))?;
        if !editing_self || rank == Rank::Admin {
            user.privilege_level = Set(rank.level());
            if rank == Rank::Admin {
                user.is_admin = Set(true);
            } else if !actor.is_admin {
                user.is_admin = Set(false);
            }
        }
    }

    if let Some(hash) = new_password {
        user.password_hash = Set(hash);
    }

    let user = user.update(db).await.map_err(taken)?;
    log::info!(
        "User {} edited by admin {}: level={} is_admin={}",
        user.id,
        actor.user_id,
        user.privilege_level,
        user.is_admin
    );
    Ok(user)
}

/// Takes a user out of every team. A leader hands over to the member who
/// joined earliest; a team left empty is deleted.
async fn leave_all_teams<C>(db: &C, user_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    let memberships = team_members::Entity::find()
        .filter(team_members::Column::UserId.eq(user_id))
        .all(db)
        .await?;
    let led: Vec<i32> = teams::Entity::find()
        .filter(teams::Column::LeaderId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();

    let mut team_ids: Vec<i32> = memberships.iter().map(|m| m.team_id).collect();
    for id in led {
        if !team_ids.contains(&id) {
            team_ids.push(id);
        }
    }

    for team_id in team_ids {
        let successor = team_members::Entity::find()
            .filter(team_members::Column::TeamId.eq(team_id))
            .filter(team_members::Column::UserId.ne(user_id))
            .order_by_asc(team_members::Column::JoinedAt)
            .order_by_asc(team_members::Column::UserId)
            .one(db)
            .await?;

        let Some(successor) = successor else {
            delete_team_cascade(db, team_id).await?;
            continue;
        };

        teams::Entity::update_many()
            .col_expr(teams::Column::LeaderId, Expr::value(successor.user_id))
            .filter(teams::Column::Id.eq(team_id))
            .filter(teams::Column::LeaderId.eq(user_id))
            .exec(db)
            .await?;

        let removed = team_members::Entity::delete_by_id((team_id, user_id))
            .exec(db)
            .await?;
        if removed.rows_affected > 0 {
            release_seat(db, team_id).await?;
        }
    }
    Ok(())
}

/// Removes the user's votes and fixes the counters they fed.
async fn withdraw_votes<C>(db: &C, user_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    let votes = forum_votes::Entity::find()
        .filter(forum_votes::Column::UserId.eq(user_id))
        .all(db)
        .await?;
    forum_votes::Entity::delete_many()
        .filter(forum_votes::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    for vote in votes {
        let target = match (vote.post_id, vote.comment_id) {
            (Some(post_id), _) => VoteTarget::Post(post_id),
            (None, Some(comment_id)) => VoteTarget::Comment(comment_id),
            (None, None) => continue,
        };
        recount(db, target).await?;
    }
    Ok(())
}

/// Removes the user's posts (with everything under them) and comments.
/// Replies by others to a removed comment become top-level comments.
async fn remove_forum_content<C>(db: &C, user_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    let post_ids: Vec<i32> = forum_posts::Entity::find()
        .filter(forum_posts::Column::AuthorId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    for post_id in post_ids {
        delete_post_cascade(db, post_id).await?;
    }

    let comment_ids: Vec<i32> = forum_comments::Entity::find()
        .filter(forum_comments::Column::AuthorId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    if comment_ids.is_empty() {
        return Ok(());
    }

    forum_comments::Entity::update_many()
        .col_expr(forum_comments::Column::ParentId, Expr::value(Option::<i32>::None))
        .filter(forum_comments::Column::ParentId.is_in(comment_ids.clone()))
        .filter(forum_comments::Column::AuthorId.ne(user_id))
        .exec(db)
        .await?;
    forum_votes::Entity::delete_many()
        .filter(forum_votes::Column::CommentId.is_in(comment_ids.clone()))
        .exec(db)
        .await?;
    forum_comments::Entity::delete_many()
        .filter(forum_comments::Column::Id.is_in(comment_ids))
        .exec(db)
        .await?;
    Ok(())
}

/// Deletes an account and everything that belongs to it. Admin only, and
/// never the actor's own account.
pub async fn admin_delete_user(
    db: &DatabaseConnection,
    actor: &Actor,
    target_id: i32,
) -> PortalResult<()> {
    actor.require_admin()?;
    if actor.is(target_id) {
        return Err(PortalError::forbidden("You cannot delete your own account."));
    }

    let txn = db.begin().await?;
    let user = users::Entity::find_by_id(target_id)
        .one(&txn)
        .await?
        .ok_or(PortalError::NotFound("User"))?;

    projects::Entity::delete_many()
        .filter(projects::Column::OwnerId.eq(target_id))
        .exec(&txn)
        .await?;
    sessions::Entity::delete_many()
        .filter(sessions::Column::UserId.eq(target_id))
        .exec(&txn)
        .await?;
    registrations::Entity::delete_many()
        .filter(registrations::Column::UserId.eq(target_id))
        .exec(&txn)
        .await?;
    team_invites::Entity::delete_many()
        .filter(
            Condition::any()
                .add(team_invites::Column::UserId.eq(target_id))
                .add(team_invites::Column::SenderId.eq(target_id)),
        )
        .exec(&txn)
        .await?;
    team_join_requests::Entity::delete_many()
        .filter(team_join_requests::Column::SenderId.eq(target_id))
        .exec(&txn)
        .await?;
    direct_messages::Entity::delete_many()
        .filter(
            Condition::any()
                .add(direct_messages::Column::SenderId.eq(target_id))
                .add(direct_messages::Column::ReceiverId.eq(target_id)),
        )
        .exec(&txn)
        .await?;
    team_messages::Entity::delete_many()
        .filter(team_messages::Column::SenderId.eq(target_id))
        .exec(&txn)
        .await?;

    withdraw_votes(&txn, target_id).await?;
    remove_forum_content(&txn, target_id).await?;
    leave_all_teams(&txn, target_id).await?;

    events::Entity::update_many()
        .col_expr(events::Column::CreatedBy, Expr::value(Option::<i32>::None))
        .filter(events::Column::CreatedBy.eq(target_id))
        .exec(&txn)
        .await?;
    platform_scores::Entity::delete_many()
        .filter(platform_scores::Column::UserId.eq(target_id))
        .exec(&txn)
        .await?;

    users::Entity::delete_by_id(target_id).exec(&txn).await?;
    txn.commit().await?;

    log::info!(
        "User {} (user_id: {}) deleted by admin {}",
        user.username,
        target_id,
        actor.user_id
    );
    Ok(())
}

/// Site totals and the ten newest accounts. Admin only.
pub async fn admin_dashboard(db: &DatabaseConnection, actor: &Actor) -> PortalResult<Dashboard> {
    actor.require_admin()?;

    Ok(Dashboard {
        user_count: users::Entity::find().count(db).await?,
        project_count: projects::Entity::find().count(db).await?,
        event_count: events::Entity::find().count(db).await?,
        team_count: teams::Entity::find().count(db).await?,
        club_count: clubs::Entity::find().count(db).await?,
        chapter_count: student_chapters::Entity::find().count(db).await?,
        recent_users: users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .limit(10)
            .all(db)
            .await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_trims_and_clears() {
        assert_eq!(optional("  ".to_string()), None);
        assert_eq!(optional(" CSE ".to_string()), Some("CSE".to_string()));
    }

    #[test]
    fn test_checked_mobile() {
        assert_eq!(checked_mobile(String::new()).unwrap(), None);
        assert!(checked_mobile("12345".to_string()).is_err());
        assert_eq!(
            checked_mobile("9876543210".to_string()).unwrap(),
            Some("9876543210".to_string())
        );
    }
}
