//! Events, the calendar and registrations.
//!
//! Coordinators (rank 3) create plain events and may only change their own.
//! Staff (rank 2) and above manage the full calendar: any event, with a
//! custom type and colour.

use crate::error::{PortalError, PortalResult};
use crate::orm::events::{self, DEFAULT_COLOR, DEFAULT_EVENT_TYPE};
use crate::orm::{registrations, teams};
use crate::privilege::{Actor, Rank};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ActiveValue::Set, ConnectionTrait, DatabaseConnection,
};

#[derive(Debug, Clone)]
pub struct EventForm {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub location: Option<String>,
    /// Stored file name of an uploaded poster.
    pub poster: Option<String>,
    pub register_url: Option<String>,
    pub event_type: Option<String>,
    pub color: Option<String>,
}

impl EventForm {
    pub fn new(title: &str, date: NaiveDateTime) -> Self {
        Self {
            title: title.to_owned(),
            description: None,
            date,
            end_date: None,
            location: None,
            poster: None,
            register_url: None,
            event_type: None,
            color: None,
        }
    }
}

/// Fields to change on an event. `Some("")` clears an optional text field.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub end_date: Option<Option<NaiveDateTime>>,
    pub location: Option<String>,
    pub poster: Option<String>,
    pub register_url: Option<String>,
    /// Ignored unless the actor is staff or above.
    pub event_type: Option<String>,
    /// Ignored unless the actor is staff or above.
    pub color: Option<String>,
}

/// Result of registering: the row, plus where to send the user next.
#[derive(Debug, Clone)]
pub struct Registration {
    pub registration: registrations::Model,
    pub register_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn check_dates(date: NaiveDateTime, end_date: Option<NaiveDateTime>) -> PortalResult<()> {
    match end_date {
        Some(end) if end < date => Err(PortalError::invalid("End date is before the start date.")),
        _ => Ok(()),
    }
}

/// Rank 3 may only touch events it created; rank 2 and above any event.
fn check_event_owner(actor: &Actor, event: &events::Model) -> PortalResult<()> {
    actor.authorize(Rank::Coordinator)?;
    if actor.rank == Rank::Coordinator && event.created_by != Some(actor.user_id) {
        log::warn!(
            "Coordinator {} refused change to event {} they did not create",
            actor.user_id,
            event.id
        );
        return Err(PortalError::forbidden("You can only change events you created."));
    }
    Ok(())
}

async fn insert_event(
    db: &DatabaseConnection,
    actor: &Actor,
    form: EventForm,
    event_type: String,
    color: String,
) -> PortalResult<events::Model> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(PortalError::invalid("Title and date are required."));
    }
    check_dates(form.date, form.end_date)?;

    let event = events::ActiveModel {
        title: Set(title.to_owned()),
        description: Set(non_empty(form.description)),
        date: Set(form.date),
        end_date: Set(form.end_date),
        location: Set(non_empty(form.location)),
        poster: Set(non_empty(form.poster)),
        register_url: Set(non_empty(form.register_url)),
        event_type: Set(event_type),
        color: Set(color),
        created_by: Set(Some(actor.user_id)),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("Event {} created by user {}", event.id, actor.user_id);
    Ok(event)
}

/// Creates a plain event. Rank 3 and above. Type and colour are the defaults.
pub async fn create_event(
    db: &DatabaseConnection,
    actor: &Actor,
    form: EventForm,
) -> PortalResult<events::Model> {
    actor.authorize(Rank::Coordinator)?;
    insert_event(
        db,
        actor,
        form,
        DEFAULT_EVENT_TYPE.to_owned(),
        DEFAULT_COLOR.to_owned(),
    )
    .await
}

/// Creates a calendar entry with its own type and colour. Rank 2 and above.
pub async fn create_calendar_event(
    db: &DatabaseConnection,
    actor: &Actor,
    mut form: EventForm,
) -> PortalResult<events::Model> {
    actor.authorize(Rank::Staff)?;
    let event_type =
        non_empty(form.event_type.take()).unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_owned());
    let color = non_empty(form.color.take()).unwrap_or_else(|| DEFAULT_COLOR.to_owned());
    insert_event(db, actor, form, event_type, color).await
}

pub async fn find_event<C>(db: &C, event_id: i32) -> PortalResult<events::Model>
where
    C: ConnectionTrait,
{
    events::Entity::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Event"))
}

pub async fn edit_event(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
    update: EventUpdate,
) -> PortalResult<events::Model> {
    let event = find_event(db, event_id).await?;
    check_event_owner(actor, &event)?;

    let date = update.date.unwrap_or(event.date);
    let end_date = update.end_date.unwrap_or(event.end_date);
    check_dates(date, end_date)?;

    let mut active: events::ActiveModel = event.into();
    if let Some(title) = update.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(PortalError::invalid("Title cannot be empty."));
        }
        active.title = Set(title.to_owned());
    }
    if update.description.is_some() {
        active.description = Set(non_empty(update.description));
    }
    active.date = Set(date);
    active.end_date = Set(end_date);
    if update.location.is_some() {
        active.location = Set(non_empty(update.location));
    }
    if update.poster.is_some() {
        active.poster = Set(non_empty(update.poster));
    }
    if update.register_url.is_some() {
        active.register_url = Set(non_empty(update.register_url));
    }
    if actor.rank.satisfies(Rank::Staff) {
        if let Some(event_type) = non_empty(update.event_type) {
            active.event_type = Set(event_type);
        }
        if let Some(color) = non_empty(update.color) {
            active.color = Set(color);
        }
    }

    let event = active.update(db).await?;
    log::info!("Event {} updated by user {}", event.id, actor.user_id);
    Ok(event)
}

/// Deletes an event with its registrations. Teams linked to it are kept and
/// unlinked.
pub async fn delete_event(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
) -> PortalResult<()> {
    let txn = db.begin().await?;
    let event = find_event(&txn, event_id).await?;
    check_event_owner(actor, &event)?;

    delete_event_cascade(&txn, event_id).await?;
    txn.commit().await?;

    log::info!("Event {} deleted by user {}", event_id, actor.user_id);
    Ok(())
}

pub(crate) async fn delete_event_cascade<C>(db: &C, event_id: i32) -> PortalResult<()>
where
    C: ConnectionTrait,
{
    registrations::Entity::delete_many()
        .filter(registrations::Column::EventId.eq(event_id))
        .exec(db)
        .await?;
    teams::Entity::update_many()
        .col_expr(teams::Column::EventId, Expr::value(Option::<i32>::None))
        .filter(teams::Column::EventId.eq(event_id))
        .exec(db)
        .await?;
    events::Entity::delete_by_id(event_id).exec(db).await?;
    Ok(())
}

/// Registers the actor for an event.
pub async fn register(
    db: &DatabaseConnection,
    actor: &Actor,
    event_id: i32,
) -> PortalResult<Registration> {
    let event = find_event(db, event_id).await?;

    let existing = registrations::Entity::find()
        .filter(registrations::Column::UserId.eq(actor.user_id))
        .filter(registrations::Column::EventId.eq(event_id))
        .count(db)
        .await?;
    if existing > 0 {
        return Err(PortalError::AlreadyRegistered);
    }

    let registration = registrations::ActiveModel {
        user_id: Set(actor.user_id),
        event_id: Set(event_id),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        if PortalError::is_unique_violation(&e) {
            PortalError::AlreadyRegistered
        } else {
            e.into()
        }
    })?;

    log::debug!("User {} registered for event {}", actor.user_id, event_id);
    Ok(Registration {
        registration,
        register_url: event.register_url,
    })
}

/// All events by date.
pub async fn list_events(db: &DatabaseConnection) -> PortalResult<Vec<events::Model>> {
    Ok(events::Entity::find()
        .order_by_asc(events::Column::Date)
        .order_by_asc(events::Column::Id)
        .all(db)
        .await?)
}

/// Events starting at or after `now`, by date.
pub async fn upcoming_events(
    db: &DatabaseConnection,
    now: NaiveDateTime,
) -> PortalResult<Vec<events::Model>> {
    Ok(events::Entity::find()
        .filter(events::Column::Date.gte(now))
        .order_by_asc(events::Column::Date)
        .order_by_asc(events::Column::Id)
        .all(db)
        .await?)
}

/// The actor's registrations with their events, newest first.
pub async fn my_registrations(
    db: &DatabaseConnection,
    actor: &Actor,
) -> PortalResult<Vec<(registrations::Model, Option<events::Model>)>> {
    Ok(registrations::Entity::find()
        .filter(registrations::Column::UserId.eq(actor.user_id))
        .order_by_desc(registrations::Column::CreatedAt)
        .order_by_desc(registrations::Column::Id)
        .find_also_related(events::Entity)
        .all(db)
        .await?)
}
