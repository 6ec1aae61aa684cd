//! SeaORM Entity for users table
//!
//! `privilege_level` and `is_admin` are independent columns. Rank 1 is the
//! highest privilege, rank 4 the default student account.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(unique)]
    pub username: String,
    pub password_hash: String,
    pub mobile: Option<String>,
    pub roll_number: Option<String>,
    pub codechef: Option<String>,
    pub hackerrank: Option<String>,
    pub leetcode: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,
    pub skills: Option<String>,
    pub college: Option<String>,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub resume_filename: Option<String>,
    pub certificates_filename: Option<String>,
    pub is_admin: bool,
    pub privilege_level: i32,
    pub is_banned: bool,
    pub is_silenced: bool,
    /// None while silenced means the silence is permanent.
    pub silence_until: Option<DateTime>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
