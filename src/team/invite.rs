//! Leader-initiated invites.
//!
//! An invite row is the pending state. Accepting or rejecting deletes it.

use super::{add_member, is_member, lock_team, Decision};
use crate::error::{PortalError, PortalResult};
use crate::orm::{team_invites, teams, users};
use crate::privilege::Actor;
use chrono::Utc;
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection};

/// Invites a user, by username, to a team the actor leads.
pub async fn invite_user(
    db: &DatabaseConnection,
    actor: &Actor,
    team_id: i32,
    invitee_username: &str,
) -> PortalResult<team_invites::Model> {
    let txn = db.begin().await?;
    let team = lock_team(&txn, team_id).await?;

    if !actor.is(team.leader_id) {
        return Err(PortalError::forbidden("Only the team leader can invite."));
    }

    let invitee = users::Entity::find()
        .filter(users::Column::Username.eq(invitee_username.trim()))
        .one(&txn)
        .await?
        .ok_or(PortalError::NotFound("User"))?;

    if is_member(&txn, team_id, invitee.id).await? {
        return Err(PortalError::AlreadyMember);
    }

    let outstanding = team_invites::Entity::find()
        .filter(team_invites::Column::TeamId.eq(team_id))
        .filter(team_invites::Column::UserId.eq(invitee.id))
        .count(&txn)
        .await?;
    if outstanding > 0 {
        return Err(PortalError::DuplicateInvite);
    }

    let invite = team_invites::ActiveModel {
        team_id: Set(team_id),
        user_id: Set(invitee.id),
        sender_id: Set(actor.user_id),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        if PortalError::is_unique_violation(&e) {
            PortalError::DuplicateInvite
        } else {
            e.into()
        }
    })?;
    txn.commit().await?;

    log::debug!(
        "Invite {} sent: team_id={} invitee={}",
        invite.id,
        team_id,
        invitee.username
    );
    Ok(invite)
}

/// Accepts or rejects an invite. Only the invitee may answer.
///
/// A full team fails with `TeamFull` and leaves the invite in place.
pub async fn resolve_invite(
    db: &DatabaseConnection,
    actor: &Actor,
    invite_id: i32,
    decision: Decision,
) -> PortalResult<()> {
    let txn = db.begin().await?;

    let invite = team_invites::Entity::find_by_id(invite_id)
        .one(&txn)
        .await?
        .ok_or(PortalError::NotFound("Invite"))?;

    if !actor.is(invite.user_id) {
        return Err(PortalError::forbidden("This invite is not addressed to you."));
    }

    if decision == Decision::Accept {
        if is_member(&txn, invite.team_id, invite.user_id).await? {
            return Err(PortalError::AlreadyMember);
        }
        add_member(&txn, invite.team_id, invite.user_id).await?;
    }

    team_invites::Entity::delete_by_id(invite.id)
        .exec(&txn)
        .await?;
    txn.commit().await?;

    log::info!(
        "Invite {} {:?}: team_id={} user_id={}",
        invite.id,
        decision,
        invite.team_id,
        invite.user_id
    );
    Ok(())
}

/// Invites addressed to the actor, with their teams, newest first.
pub async fn invitations_for(
    db: &DatabaseConnection,
    actor: &Actor,
) -> PortalResult<Vec<(team_invites::Model, Option<teams::Model>)>> {
    Ok(team_invites::Entity::find()
        .filter(team_invites::Column::UserId.eq(actor.user_id))
        .order_by_desc(team_invites::Column::CreatedAt)
        .find_also_related(teams::Entity)
        .all(db)
        .await?)
}
