//! SeaORM Entity for platform_scores table
//!
//! One score per (user, platform); feeds the leaderboard.

use sea_orm::entity::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
pub enum Platform {
    #[sea_orm(string_value = "hackerrank")]
    HackerRank,
    #[sea_orm(string_value = "codechef")]
    CodeChef,
    #[sea_orm(string_value = "leetcode")]
    LeetCode,
}

impl Platform {
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug.trim().to_lowercase().as_str() {
            "hackerrank" => Some(Platform::HackerRank),
            "codechef" => Some(Platform::CodeChef),
            "leetcode" => Some(Platform::LeetCode),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "platform_scores")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub platform: Platform,
    pub score: i64,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
}

impl ActiveModelBehavior for ActiveModel {}
