//! Forum categories and which ranks may post in them.

use crate::app_config::ForumConfig;
use crate::error::{PortalError, PortalResult};
use crate::orm::forum_categories;
use crate::privilege::{Actor, Rank};
use chrono::Utc;
use sea_orm::{entity::*, query::*, ActiveValue::Set, DatabaseConnection};

pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("General", "General discussions"),
    ("Questions", "Ask questions and get help"),
    ("Projects", "Share your projects"),
    ("Events", "Discuss events and competitions"),
    ("Announcements", "Important announcements"),
    ("Tech", "Technology discussions"),
    ("Study", "Study groups and resources"),
    ("Hackathons", "Hackathon discussions"),
];

/// Whether a rank may post in a category with the given name.
///
/// Ranks 1 and 2 may post anywhere. Rank 3 may post anywhere except the
/// staff-only categories. Rank 4 is limited to the student allow-list.
pub fn rank_may_post_in(rank: Rank, category_name: &str, forum: &ForumConfig) -> bool {
    let name = category_name.to_lowercase();
    match rank {
        Rank::Admin | Rank::Staff => true,
        Rank::Coordinator => !forum.staff_categories.iter().any(|c| *c == name),
        Rank::Student => forum.student_categories.iter().any(|c| *c == name),
    }
}

/// Category eligibility step of the posting chain.
pub(crate) fn check_category(
    actor: &Actor,
    category: Option<&forum_categories::Model>,
    forum: &ForumConfig,
) -> PortalResult<()> {
    match category {
        Some(category) if rank_may_post_in(actor.rank, &category.name, forum) => Ok(()),
        Some(category) => {
            log::debug!(
                "User {} (rank {}) refused posting in category {}",
                actor.user_id,
                actor.rank.level(),
                category.name
            );
            Err(PortalError::forbidden(format!(
                "You cannot post in the {} category.",
                category.name
            )))
        }
        None if actor.rank == Rank::Student => Err(PortalError::forbidden(
            "Students must select a category (Questions, Study, or Doubts).",
        )),
        None => Ok(()),
    }
}

/// All categories, by name.
pub async fn list_categories(
    db: &DatabaseConnection,
) -> PortalResult<Vec<forum_categories::Model>> {
    Ok(forum_categories::Entity::find()
        .order_by_asc(forum_categories::Column::Name)
        .all(db)
        .await?)
}

/// Categories the actor may post in, by name.
pub async fn categories_for(
    db: &DatabaseConnection,
    actor: &Actor,
) -> PortalResult<Vec<forum_categories::Model>> {
    let forum = crate::app_config::forum();
    Ok(list_categories(db)
        .await?
        .into_iter()
        .filter(|c| rank_may_post_in(actor.rank, &c.name, &forum))
        .collect())
}

/// Creates a category. Admin only.
pub async fn create_category(
    db: &DatabaseConnection,
    actor: &Actor,
    name: &str,
    description: Option<&str>,
) -> PortalResult<forum_categories::Model> {
    actor.require_admin()?;
    insert_category(db, name, description).await
}

async fn insert_category(
    db: &DatabaseConnection,
    name: &str,
    description: Option<&str>,
) -> PortalResult<forum_categories::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PortalError::invalid("Category name is required."));
    }

    forum_categories::ActiveModel {
        name: Set(name.to_owned()),
        description: Set(description.map(str::to_owned)),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        if PortalError::is_unique_violation(&e) {
            PortalError::invalid("Category already exists.")
        } else {
            e.into()
        }
    })
}

/// Creates any missing default category. Returns how many were created.
pub async fn seed_default_categories(db: &DatabaseConnection) -> PortalResult<usize> {
    let mut created = 0;
    for (name, description) in DEFAULT_CATEGORIES {
        let existing = forum_categories::Entity::find()
            .filter(forum_categories::Column::Name.eq(*name))
            .one(db)
            .await?;
        if existing.is_none() {
            insert_category(db, name, Some(description)).await?;
            log::info!("Created forum category: {}", name);
            created += 1;
        }
    }
    Ok(created)
}
