//! Member-initiated join requests.

use super::{add_member, find_team, is_member, lock_team, Decision};
use crate::error::{PortalError, PortalResult};
use crate::orm::team_join_requests::{self, JoinRequestStatus};
use crate::privilege::Actor;
use chrono::Utc;
use sea_orm::{entity::*, query::*, ActiveValue::Set, ConnectionTrait, DatabaseConnection};

/// Asks to join a team as the actor.
pub async fn request_join(
    db: &DatabaseConnection,
    actor: &Actor,
    team_id: i32,
) -> PortalResult<team_join_requests::Model> {
    let txn = db.begin().await?;
    let team = lock_team(&txn, team_id).await?;

    if is_member(&txn, team_id, actor.user_id).await? {
        return Err(PortalError::AlreadyMember);
    }
    if team.is_full() {
        return Err(PortalError::TeamFull);
    }

    let pending = team_join_requests::Entity::find()
        .filter(team_join_requests::Column::TeamId.eq(team_id))
        .filter(team_join_requests::Column::SenderId.eq(actor.user_id))
        .filter(team_join_requests::Column::Status.eq(JoinRequestStatus::Pending))
        .count(&txn)
        .await?;
    if pending > 0 {
        return Err(PortalError::DuplicateRequest);
    }

    let request = team_join_requests::ActiveModel {
        team_id: Set(team_id),
        sender_id: Set(actor.user_id),
        status: Set(JoinRequestStatus::Pending),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    log::debug!(
        "Join request {} sent: team_id={} user_id={}",
        request.id,
        team_id,
        actor.user_id
    );
    Ok(request)
}

/// Accepts or rejects a pending join request. Team leader only.
///
/// Capacity is checked again here. If the team filled up since the request
/// was made the call fails with `TeamFull` and the request stays pending.
pub async fn resolve_join_request(
    db: &DatabaseConnection,
    actor: &Actor,
    request_id: i32,
    decision: Decision,
) -> PortalResult<team_join_requests::Model> {
    let txn = db.begin().await?;

    let request = team_join_requests::Entity::find_by_id(request_id)
        .one(&txn)
        .await?
        .ok_or(PortalError::NotFound("Join request"))?;
    let team = find_team(&txn, request.team_id).await?;

    if !actor.is(team.leader_id) {
        log::warn!(
            "User {} tried to resolve join request {} for team {} they do not lead",
            actor.user_id,
            request_id,
            team.id
        );
        return Err(PortalError::forbidden("Only the team leader can do this."));
    }
    if !request.status.is_pending() {
        return Err(PortalError::invalid("Join request was already resolved."));
    }

    let status = match decision {
        Decision::Accept => {
            if is_member(&txn, team.id, request.sender_id).await? {
                return Err(PortalError::AlreadyMember);
            }
            add_member(&txn, team.id, request.sender_id).await?;
            JoinRequestStatus::Accepted
        }
        Decision::Reject => JoinRequestStatus::Rejected,
    };

    let mut active: team_join_requests::ActiveModel = request.into();
    active.status = Set(status);
    let request = active.update(&txn).await?;
    txn.commit().await?;

    log::info!(
        "Join request {} {:?}: team_id={} user_id={}",
        request.id,
        request.status,
        request.team_id,
        request.sender_id
    );
    Ok(request)
}

/// Pending requests for a team, oldest first.
pub async fn pending_requests<C>(
    db: &C,
    team_id: i32,
) -> PortalResult<Vec<team_join_requests::Model>>
where
    C: ConnectionTrait,
{
    Ok(team_join_requests::Entity::find()
        .filter(team_join_requests::Column::TeamId.eq(team_id))
        .filter(team_join_requests::Column::Status.eq(JoinRequestStatus::Pending))
        .order_by_asc(team_join_requests::Column::CreatedAt)
        .order_by_asc(team_join_requests::Column::Id)
        .all(db)
        .await?)
}
