//! Direct messages between users and team chat.

use crate::error::{PortalError, PortalResult};
use crate::orm::{direct_messages, team_messages, users};
use crate::privilege::Actor;
use crate::team::{find_team, is_member};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ActiveValue::Set, Condition, DatabaseConnection,
};
use std::collections::HashMap;

/// Longest inbox preview, in characters.
pub const PREVIEW_CHARS: usize = 80;

/// One conversation partner in the inbox.
#[derive(Debug, Clone)]
pub struct InboxEntry {
    pub partner: users::Model,
    pub last_time: NaiveDateTime,
    /// Incoming messages from this partner not yet read.
    pub unread: u64,
    pub preview: String,
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

fn between(a: i32, b: i32) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(direct_messages::Column::SenderId.eq(a))
                .add(direct_messages::Column::ReceiverId.eq(b)),
        )
        .add(
            Condition::all()
                .add(direct_messages::Column::SenderId.eq(b))
                .add(direct_messages::Column::ReceiverId.eq(a)),
        )
}

pub async fn send_direct_message(
    db: &DatabaseConnection,
    actor: &Actor,
    receiver_id: i32,
    content: &str,
) -> PortalResult<direct_messages::Model> {
    if actor.is(receiver_id) {
        return Err(PortalError::invalid("You can't message yourself."));
    }
    let content = content.trim();
    if content.is_empty() {
        return Err(PortalError::invalid("Message cannot be empty."));
    }

    users::Entity::find_by_id(receiver_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("User"))?;

    let msg = direct_messages::ActiveModel {
        sender_id: Set(actor.user_id),
        receiver_id: Set(receiver_id),
        content: Set(content.to_owned()),
        is_read: Set(false),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::debug!(
        "Direct message {} sent: {} -> {}",
        msg.id,
        actor.user_id,
        receiver_id
    );
    Ok(msg)
}

/// Messages exchanged with `other_id`, oldest first. Incoming messages are
/// marked read.
pub async fn conversation(
    db: &DatabaseConnection,
    actor: &Actor,
    other_id: i32,
) -> PortalResult<Vec<direct_messages::Model>> {
    if actor.is(other_id) {
        return Err(PortalError::invalid("You can't message yourself."));
    }
    users::Entity::find_by_id(other_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("User"))?;

    direct_messages::Entity::update_many()
        .col_expr(direct_messages::Column::IsRead, Expr::value(true))
        .filter(direct_messages::Column::SenderId.eq(other_id))
        .filter(direct_messages::Column::ReceiverId.eq(actor.user_id))
        .filter(direct_messages::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(direct_messages::Entity::find()
        .filter(between(actor.user_id, other_id))
        .order_by_asc(direct_messages::Column::CreatedAt)
        .order_by_asc(direct_messages::Column::Id)
        .all(db)
        .await?)
}

/// Conversation partners, most recent first.
pub async fn inbox(db: &DatabaseConnection, actor: &Actor) -> PortalResult<Vec<InboxEntry>> {
    let messages = direct_messages::Entity::find()
        .filter(
            Condition::any()
                .add(direct_messages::Column::SenderId.eq(actor.user_id))
                .add(direct_messages::Column::ReceiverId.eq(actor.user_id)),
        )
        .order_by_desc(direct_messages::Column::CreatedAt)
        .order_by_desc(direct_messages::Column::Id)
        .all(db)
        .await?;

    // Newest message first, so the first one seen per partner is the latest.
    let mut order: Vec<i32> = Vec::new();
    let mut latest: HashMap<i32, &direct_messages::Model> = HashMap::new();
    let mut unread: HashMap<i32, u64> = HashMap::new();
    for msg in &messages {
        let partner_id = if msg.sender_id == actor.user_id {
            msg.receiver_id
        } else {
            msg.sender_id
        };
        if !latest.contains_key(&partner_id) {
            order.push(partner_id);
            latest.insert(partner_id, msg);
        }
        if msg.receiver_id == actor.user_id && !msg.is_read {
            *unread.entry(partner_id).or_default() += 1;
        }
    }

    if order.is_empty() {
        return Ok(Vec::new());
    }

    let mut partners: HashMap<i32, users::Model> = users::Entity::find()
        .filter(users::Column::Id.is_in(order.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(order
        .into_iter()
        .filter_map(|partner_id| {
            let partner = partners.remove(&partner_id)?;
            let last = latest.get(&partner_id)?;
            Some(InboxEntry {
                partner,
                last_time: last.created_at,
                unread: unread.get(&partner_id).copied().unwrap_or(0),
                preview: preview(&last.content),
            })
        })
        .collect())
}

/// Number of unread incoming direct messages.
pub async fn unread_count(db: &DatabaseConnection, actor: &Actor) -> PortalResult<u64> {
    Ok(direct_messages::Entity::find()
        .filter(direct_messages::Column::ReceiverId.eq(actor.user_id))
        .filter(direct_messages::Column::IsRead.eq(false))
        .count(db)
        .await?)
}

/// Posts to a team's chat. Members only.
pub async fn post_team_message(
    db: &DatabaseConnection,
    actor: &Actor,
    team_id: i32,
    content: &str,
) -> PortalResult<team_messages::Model> {
    find_team(db, team_id).await?;
    if !is_member(db, team_id, actor.user_id).await? {
        return Err(PortalError::forbidden("You are not a member of this team."));
    }
    let content = content.trim();
    if content.is_empty() {
        return Err(PortalError::invalid("Message cannot be empty."));
    }

    Ok(team_messages::ActiveModel {
        team_id: Set(team_id),
        sender_id: Set(actor.user_id),
        content: Set(content.to_owned()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// A team's chat, oldest first. Members only.
pub async fn team_messages(
    db: &DatabaseConnection,
    actor: &Actor,
    team_id: i32,
) -> PortalResult<Vec<team_messages::Model>> {
    find_team(db, team_id).await?;
    if !is_member(db, team_id, actor.user_id).await? {
        return Err(PortalError::forbidden("You are not a member of this team."));
    }

    Ok(team_messages::Entity::find()
        .filter(team_messages::Column::TeamId.eq(team_id))
        .order_by_asc(team_messages::Column::CreatedAt)
        .order_by_asc(team_messages::Column::Id)
        .all(db)
        .await?)
}
