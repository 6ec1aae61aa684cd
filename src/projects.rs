//! Project showcase.

use crate::error::{PortalError, PortalResult};
use crate::orm::{projects, users};
use crate::privilege::Actor;
use chrono::Utc;
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection};

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub title: String,
    /// What the project does.
    pub idea: String,
    pub tech: Option<String>,
    pub github: Option<String>,
    /// Link to a demo video.
    pub demo: Option<String>,
}

/// Builds the stored description from the idea plus optional tech stack and
/// demo link sections.
fn compose_description(idea: &str, tech: Option<&str>, demo: Option<&str>) -> String {
    let mut description = idea.to_owned();
    if let Some(tech) = tech {
        description.push_str("\n\nTech Stack: ");
        description.push_str(tech);
    }
    if let Some(demo) = demo {
        description.push_str("\n\nDemo Video: ");
        description.push_str(demo);
    }
    description
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Publishes a project owned by the actor.
pub async fn create_project(
    db: &DatabaseConnection,
    actor: &Actor,
    form: NewProject,
) -> PortalResult<projects::Model> {
    let title = form.title.trim();
    let idea = form.idea.trim();
    if title.is_empty() || idea.is_empty() {
        return Err(PortalError::invalid("Project title and idea are required."));
    }

    let project = projects::ActiveModel {
        title: Set(title.to_owned()),
        description: Set(Some(compose_description(
            idea,
            trimmed(&form.tech),
            trimmed(&form.demo),
        ))),
        github: Set(trimmed(&form.github).map(str::to_owned)),
        owner_id: Set(actor.user_id),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("Project {} uploaded by user {}", project.id, actor.user_id);
    Ok(project)
}

/// All projects with their owners, newest first.
pub async fn list_projects(
    db: &DatabaseConnection,
) -> PortalResult<Vec<(projects::Model, Option<users::Model>)>> {
    Ok(projects::Entity::find()
        .order_by_desc(projects::Column::CreatedAt)
        .order_by_desc(projects::Column::Id)
        .find_also_related(users::Entity)
        .all(db)
        .await?)
}

pub async fn projects_of(
    db: &DatabaseConnection,
    user_id: i32,
) -> PortalResult<Vec<projects::Model>> {
    Ok(projects::Entity::find()
        .filter(projects::Column::OwnerId.eq(user_id))
        .order_by_desc(projects::Column::CreatedAt)
        .order_by_desc(projects::Column::Id)
        .all(db)
        .await?)
}

pub async fn get_project(
    db: &DatabaseConnection,
    project_id: i32,
) -> PortalResult<projects::Model> {
    projects::Entity::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Project"))
}
