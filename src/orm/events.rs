//! SeaORM Entity for events table

use sea_orm::entity::prelude::*;

pub const DEFAULT_EVENT_TYPE: &str = "general";
pub const DEFAULT_COLOR: &str = "#007bff";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub date: DateTime,
    /// Last day of a multi-day event.
    pub end_date: Option<DateTime>,
    pub location: Option<String>,
    pub poster: Option<String>,
    pub register_url: Option<String>,
    /// general, exam, holiday, deadline, ...
    pub event_type: String,
    pub color: String,
    pub created_by: Option<i32>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatedBy",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Creator,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
