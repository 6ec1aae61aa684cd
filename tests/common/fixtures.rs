//! Test fixtures for creating test data
#![allow(dead_code)]

use chrono::{NaiveDateTime, Utc};
use cloudroom::orm::{events, forum_categories, forum_posts, users};
use cloudroom::{Actor, Rank};
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};

pub const TEST_PASSWORD: &str = "Passw0rd!";

/// Inserts a user directly, skipping validation and password hashing.
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    rank: Rank,
    is_admin: bool,
) -> Result<users::Model, DbErr> {
    let mut user = cloudroom::create_user::new_user_model(
        username,
        &format!("{}@test.com", username),
        username,
        "not-a-real-hash",
    );
    user.privilege_level = Set(rank.level());
    user.is_admin = Set(is_admin);
    user.insert(db).await
}

pub async fn create_student(db: &DatabaseConnection, username: &str) -> Result<Actor, DbErr> {
    let user = create_test_user(db, username, Rank::Student, false).await?;
    Ok(Actor::from_user(&user))
}

/// Rank 1 with the admin flag set.
pub async fn create_admin(db: &DatabaseConnection, username: &str) -> Result<Actor, DbErr> {
    let user = create_test_user(db, username, Rank::Admin, true).await?;
    Ok(Actor::from_user(&user))
}

pub async fn create_test_category(
    db: &DatabaseConnection,
    name: &str,
) -> Result<forum_categories::Model, DbErr> {
    forum_categories::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// A post inserted directly, bypassing the posting checks.
pub async fn create_test_post(
    db: &DatabaseConnection,
    author_id: i32,
    title: &str,
) -> Result<forum_posts::Model, DbErr> {
    let now = Utc::now().naive_utc();
    forum_posts::ActiveModel {
        title: Set(title.to_string()),
        content: Set(format!("Body of {}", title)),
        author_id: Set(author_id),
        category_id: Set(None),
        upvotes: Set(0),
        downvotes: Set(0),
        score: Set(0),
        is_locked: Set(false),
        is_pinned: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Reloads a user row.
pub async fn reload_user(db: &DatabaseConnection, user_id: i32) -> users::Model {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await
        .expect("Failed to query user")
        .expect("User not found")
}

pub async fn count_events(db: &DatabaseConnection) -> u64 {
    use sea_orm::PaginatorTrait;
    events::Entity::find()
        .count(db)
        .await
        .expect("Failed to count events")
}

pub fn days_from_now(days: i64) -> NaiveDateTime {
    Utc::now().naive_utc() + chrono::Duration::days(days)
}
