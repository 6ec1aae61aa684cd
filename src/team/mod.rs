//! Team creation, capacity-bounded membership and removal.
//!
//! A user reaches membership one of three ways: by creating the team, by a
//! join request the leader accepts, or by an invite they accept. Every path
//! that adds a member goes through [`reserve_seat`], which bumps
//! `member_count` only while it is below `size_limit`. Running that in the
//! same transaction as the member insert means two acceptances racing for
//! the last seat cannot both succeed.

pub mod invite;
pub mod join;

pub use invite::{invitations_for, invite_user, resolve_invite};
pub use join::{pending_requests, request_join, resolve_join_request};

use crate::error::{PortalError, PortalResult};
use crate::orm::{
    events, team_invites, team_join_requests, team_members, team_messages, teams, users,
};
use crate::privilege::Actor;
use chrono::Utc;
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ActiveValue::Set, ConnectionTrait, DatabaseConnection,
};

/// Leader's answer to a join request, or an invitee's answer to an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct NewTeam {
    pub name: String,
    pub description: Option<String>,
    /// Falls back to the configured default when None.
    pub size_limit: Option<i32>,
    pub event_id: Option<i32>,
}

/// What happened to the team after a member left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// The last member left, so the team was deleted.
    TeamDeleted,
}

#[derive(Debug, Clone)]
pub struct TeamDetails {
    pub team: teams::Model,
    /// Ordered by join time; the leader comes first.
    pub members: Vec<users::Model>,
    pub pending_requests: Vec<team_join_requests::Model>,
}

/// Creates a team led by the actor, who becomes its first member.
pub async fn create_team(
    db: &DatabaseConnection,
    actor: &Actor,
    form: NewTeam,
) -> PortalResult<teams::Model> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(PortalError::invalid("Team name is required."));
    }

    let size_limit = form
        .size_limit
        .unwrap_or_else(|| crate::app_config::teams().default_size_limit);
    if size_limit <= 0 {
        return Err(PortalError::invalid("Team size must be a positive number."));
    }

    let txn = db.begin().await?;

    if let Some(event_id) = form.event_id {
        events::Entity::find_by_id(event_id)
            .one(&txn)
            .await?
            .ok_or(PortalError::NotFound("Event"))?;
    }

    let now = Utc::now().naive_utc();
    let team = teams::ActiveModel {
        name: Set(name.to_owned()),
        description: Set(form
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty())),
        leader_id: Set(actor.user_id),
        size_limit: Set(size_limit),
        member_count: Set(1),
        event_id: Set(form.event_id),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    team_members::ActiveModel {
        team_id: Set(team.id),
        user_id: Set(actor.user_id),
        joined_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    log::info!(
        "Team created: team_id={} leader_id={} size_limit={}",
        team.id,
        actor.user_id,
        size_limit
    );
    Ok(team)
}

pub async fn find_team<C>(db: &C, team_id: i32) -> PortalResult<teams::Model>
where
    C: ConnectionTrait,
{
    teams::Entity::find_by_id(team_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Team"))
}

/// Loads a team after taking its row lock with a no-op update, so checks made
/// later in the same transaction cannot interleave with another caller's.
pub(crate) async fn lock_team<C>(db: &C, team_id: i32) -> PortalResult<teams::Model>
where
    C: ConnectionTrait,
{
    let res = teams::Entity::update_many()
        .col_expr(
            teams::Column::MemberCount,
            Expr::col(teams::Column::MemberCount).into(),
        )
        .filter(teams::Column::Id.eq(team_id))
        .exec(db)
        .await?;
    if res.rows_affected == 0 {
        return Err(PortalError::NotFound("Team"));
    }
    find_team(db, team_id).await
}

pub async fn is_member<C>(db: &C, team_id: i32, user_id: i32) -> PortalResult<bool>
where
    C: ConnectionTrait,
{
    let found = team_members::Entity::find_by_id((team_id, user_id))
        .one(db)
        .await?;
    Ok(found.is_some())
}

/// Takes one free seat, failing with `TeamFull` when none is left.
///
/// The check and the increment are a single conditional UPDATE, so the row
/// lock it takes serializes competing reservations on the same team.
pub(crate) async fn reserve_seat<C>(db: &C, team_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    let res = teams::Entity::update_many()
        .col_expr(
            teams::Column::MemberCount,
            Expr::col(teams::Column::MemberCount).add(1),
        )
        .filter(teams::Column::Id.eq(team_id))
        .filter(Expr::cust("member_count < size_limit"))
        .exec(db)
        .await?;

    if res.rows_affected == 0 {
        // Either the team vanished or it is full.
        find_team(db, team_id).await?;
        return Err(PortalError::TeamFull);
    }
    Ok(())
}

pub(crate) async fn release_seat<C>(db: &C, team_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    teams::Entity::update_many()
        .col_expr(
            teams::Column::MemberCount,
            Expr::col(teams::Column::MemberCount).sub(1),
        )
        .filter(teams::Column::Id.eq(team_id))
        .filter(teams::Column::MemberCount.gt(0))
        .exec(db)
        .await?;
    Ok(())
}

/// Reserves a seat and inserts the membership row.
pub(crate) async fn add_member<C>(db: &C, team_id: i32, user_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    reserve_seat(db, team_id).await?;
    team_members::ActiveModel {
        team_id: Set(team_id),
        user_id: Set(user_id),
        joined_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .map_err(|e| {
        if PortalError::is_unique_violation(&e) {
            PortalError::AlreadyMember
        } else {
            e.into()
        }
    })?;
    Ok(())
}

/// Deletes a team together with everything it owns.
pub(crate) async fn delete_team_cascade<C>(db: &C, team_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    team_join_requests::Entity::delete_many()
        .filter(team_join_requests::Column::TeamId.eq(team_id))
        .exec(db)
        .await?;
    team_invites::Entity::delete_many()
        .filter(team_invites::Column::TeamId.eq(team_id))
        .exec(db)
        .await?;
    team_messages::Entity::delete_many()
        .filter(team_messages::Column::TeamId.eq(team_id))
        .exec(db)
        .await?;
    team_members::Entity::delete_many()
        .filter(team_members::Column::TeamId.eq(team_id))
        .exec(db)
        .await?;
    teams::Entity::delete_by_id(team_id).exec(db).await?;
    Ok(())
}

/// Removes `user_id` from a team.
///
/// Allowed for the member themselves, the leader, or an admin. The leader
/// can only leave a team with other members if `new_leader` names one of
/// them; the handover happens in the same transaction. Removing the last
/// member deletes the team.
pub async fn remove_member(
    db: &DatabaseConnection,
    actor: &Actor,
    team_id: i32,
    user_id: i32,
    new_leader: Option<i32>,
) -> PortalResult<Removal> {
    let txn = db.begin().await?;
    let team = find_team(&txn, team_id).await?;

    if !(actor.is(user_id) || actor.is(team.leader_id) || actor.has_admin()) {
        return Err(PortalError::forbidden(
            "Only the leader or an admin can remove other members.",
        ));
    }

    if !is_member(&txn, team_id, user_id).await? {
        return Err(PortalError::NotFound("Team member"));
    }

    let remaining = team_members::Entity::find()
        .filter(team_members::Column::TeamId.eq(team_id))
        .filter(team_members::Column::UserId.ne(user_id))
        .count(&txn)
        .await?;

    if remaining == 0 {
        delete_team_cascade(&txn, team_id).await?;
        txn.commit().await?;
        log::info!("Team deleted after last member left: team_id={}", team_id);
        return Ok(Removal::TeamDeleted);
    }

    if user_id == team.leader_id {
        let successor = match new_leader {
            Some(successor) if successor != user_id => successor,
            _ => {
                return Err(PortalError::forbidden(
                    "Cannot remove team leader. Assign a new leader first.",
                ))
            }
        };
        if !is_member(&txn, team_id, successor).await? {
            return Err(PortalError::invalid("New leader must be a team member."));
        }
        let mut active: teams::ActiveModel = team.into();
        active.leader_id = Set(successor);
        active.update(&txn).await?;
        log::info!(
            "Team leadership transferred: team_id={} new_leader_id={}",
            team_id,
            successor
        );
    }

    team_members::Entity::delete_by_id((team_id, user_id))
        .exec(&txn)
        .await?;
    release_seat(&txn, team_id).await?;
    txn.commit().await?;

    log::info!(
        "Member removed from team: team_id={} user_id={} by={}",
        team_id,
        user_id,
        actor.user_id
    );
    Ok(Removal::Removed)
}

/// Deletes a team. Leader or admin only.
pub async fn delete_team(db: &DatabaseConnection, actor: &Actor, team_id: i32) -> PortalResult<()> {
    let txn = db.begin().await?;
    let team = find_team(&txn, team_id).await?;

    if !actor.is(team.leader_id) {
        actor.require_admin()?;
    }

    delete_team_cascade(&txn, team_id).await?;
    txn.commit().await?;

    log::info!("Team deleted: team_id={} by={}", team_id, actor.user_id);
    Ok(())
}

pub async fn team_details(db: &DatabaseConnection, team_id: i32) -> PortalResult<TeamDetails> {
    let team = find_team(db, team_id).await?;

    let members = team_members::Entity::find()
        .filter(team_members::Column::TeamId.eq(team_id))
        .order_by_asc(team_members::Column::JoinedAt)
        .find_also_related(users::Entity)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(_, user)| user)
        .collect();

    let pending_requests = pending_requests(db, team_id).await?;

    Ok(TeamDetails {
        team,
        members,
        pending_requests,
    })
}

/// All teams, newest first.
pub async fn list_teams(db: &DatabaseConnection) -> PortalResult<Vec<teams::Model>> {
    Ok(teams::Entity::find()
        .order_by_desc(teams::Column::CreatedAt)
        .order_by_desc(teams::Column::Id)
        .all(db)
        .await?)
}

/// Teams the user belongs to.
pub async fn teams_of(db: &DatabaseConnection, user_id: i32) -> PortalResult<Vec<teams::Model>> {
    let team_ids: Vec<i32> = team_members::Entity::find()
        .filter(team_members::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.team_id)
        .collect();

    if team_ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(teams::Entity::find()
        .filter(teams::Column::Id.is_in(team_ids))
        .order_by_asc(teams::Column::Name)
        .all(db)
        .await?)
}
