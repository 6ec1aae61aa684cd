//! Clubs and student chapters.

use crate::error::{PortalError, PortalResult};
use crate::orm::{clubs, student_chapters};
use crate::privilege::Actor;
use chrono::Utc;
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection, DbErr};

#[derive(Debug, Clone, Default)]
pub struct NewClub {
    pub name: String,
    pub description: Option<String>,
    pub contact: Option<String>,
    pub faculty_incharge: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewChapter {
    pub name: String,
    pub associated_club: Option<String>,
    pub description: Option<String>,
    pub contact: Option<String>,
    pub student_lead: Option<String>,
}

/// Adds `https://` to links stored without a scheme. Blank stays blank.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        url.to_owned()
    } else {
        format!("https://{}", url)
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn duplicate_name(e: DbErr, what: &str) -> PortalError {
    if PortalError::is_unique_violation(&e) {
        PortalError::invalid(format!("A {} with that name already exists.", what))
    } else {
        e.into()
    }
}

pub async fn create_club(
    db: &DatabaseConnection,
    actor: &Actor,
    form: NewClub,
) -> PortalResult<clubs::Model> {
    actor.require_admin()?;
    let name = form.name.trim();
    if name.is_empty() {
        return Err(PortalError::invalid("Club name is required."));
    }

    let club = clubs::ActiveModel {
        name: Set(name.to_owned()),
        description: Set(clean(form.description)),
        contact: Set(clean(form.contact)),
        faculty_incharge: Set(clean(form.faculty_incharge)),
        website: Set(clean(form.website)),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| duplicate_name(e, "club"))?;

    log::info!("Club created: {}", club.name);
    Ok(club)
}

pub async fn create_chapter(
    db: &DatabaseConnection,
    actor: &Actor,
    form: NewChapter,
) -> PortalResult<student_chapters::Model> {
    actor.require_admin()?;
    let name = form.name.trim();
    if name.is_empty() {
        return Err(PortalError::invalid("Chapter name is required."));
    }

    let chapter = student_chapters::ActiveModel {
        name: Set(name.to_owned()),
        associated_club: Set(clean(form.associated_club)),
        description: Set(clean(form.description)),
        contact: Set(clean(form.contact)),
        student_lead: Set(clean(form.student_lead)),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| duplicate_name(e, "chapter"))?;

    log::info!("Student chapter created: {}", chapter.name);
    Ok(chapter)
}

pub async fn list_clubs(db: &DatabaseConnection) -> PortalResult<Vec<clubs::Model>> {
    Ok(clubs::Entity::find()
        .order_by_asc(clubs::Column::Name)
        .all(db)
        .await?)
}

pub async fn list_chapters(db: &DatabaseConnection) -> PortalResult<Vec<student_chapters::Model>> {
    Ok(student_chapters::Entity::find()
        .order_by_asc(student_chapters::Column::Name)
        .all(db)
        .await?)
}

/// A club with its contact and website links normalized.
pub async fn get_club(db: &DatabaseConnection, club_id: i32) -> PortalResult<clubs::Model> {
    let mut club = clubs::Entity::find_by_id(club_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Club"))?;
    club.contact = club.contact.as_deref().map(normalize_url);
    club.website = club.website.as_deref().map(normalize_url);
    Ok(club)
}

/// A chapter with its contact link normalized.
pub async fn get_chapter(
    db: &DatabaseConnection,
    chapter_id: i32,
) -> PortalResult<student_chapters::Model> {
    let mut chapter = student_chapters::Entity::find_by_id(chapter_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Chapter"))?;
    chapter.contact = chapter.contact.as_deref().map(normalize_url);
    Ok(chapter)
}
