//! Database pool and schema setup.

use crate::orm::{
    clubs, direct_messages, events, forum_categories, forum_comments, forum_posts, forum_votes,
    platform_scores, projects, registrations, sessions, student_chapters, team_invites,
    team_join_requests, team_members, team_messages, teams, users,
};
use once_cell::sync::OnceCell;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Returns the process-wide pool. Panics if `init_db` has not run.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("Database pool not initialized")
}

/// Connects the process-wide pool.
pub async fn init_db(url: String) -> Result<&'static DatabaseConnection, DbErr> {
    let db = connect(&url).await?;
    let _ = DB_POOL.set(db);
    Ok(get_db_pool())
}

/// Opens a pool using the `[database]` configuration section.
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let settings = crate::app_config::database();
    let mut opt = ConnectOptions::new(url.to_owned());
    opt.max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .sqlx_logging(settings.sqlx_logging);

    log::debug!(
        "Connecting to database (max_connections={})",
        settings.max_connections
    );
    Database::connect(opt).await
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

async fn create_index(db: &DatabaseConnection, stmt: IndexCreateStatement) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Creates every table and the composite unique indexes if they are missing.
///
/// Tables are created parents first so foreign keys resolve on PostgreSQL.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, users::Entity).await?;
    create_table(db, &schema, sessions::Entity).await?;
    create_table(db, &schema, projects::Entity).await?;
    create_table(db, &schema, events::Entity).await?;
    create_table(db, &schema, registrations::Entity).await?;
    create_table(db, &schema, teams::Entity).await?;
    create_table(db, &schema, team_members::Entity).await?;
    create_table(db, &schema, team_join_requests::Entity).await?;
    create_table(db, &schema, team_invites::Entity).await?;
    create_table(db, &schema, team_messages::Entity).await?;
    create_table(db, &schema, forum_categories::Entity).await?;
    create_table(db, &schema, forum_posts::Entity).await?;
    create_table(db, &schema, forum_comments::Entity).await?;
    create_table(db, &schema, forum_votes::Entity).await?;
    create_table(db, &schema, direct_messages::Entity).await?;
    create_table(db, &schema, clubs::Entity).await?;
    create_table(db, &schema, student_chapters::Entity).await?;
    create_table(db, &schema, platform_scores::Entity).await?;

    create_index(
        db,
        Index::create()
            .name("unique_post_vote")
            .table(forum_votes::Entity)
            .col(forum_votes::Column::UserId)
            .col(forum_votes::Column::PostId)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;
    create_index(
        db,
        Index::create()
            .name("unique_comment_vote")
            .table(forum_votes::Entity)
            .col(forum_votes::Column::UserId)
            .col(forum_votes::Column::CommentId)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;
    create_index(
        db,
        Index::create()
            .name("unique_registration")
            .table(registrations::Entity)
            .col(registrations::Column::UserId)
            .col(registrations::Column::EventId)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;
    create_index(
        db,
        Index::create()
            .name("unique_team_invite")
            .table(team_invites::Entity)
            .col(team_invites::Column::TeamId)
            .col(team_invites::Column::UserId)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;
    create_index(
        db,
        Index::create()
            .name("unique_platform_score")
            .table(platform_scores::Entity)
            .col(platform_scores::Column::UserId)
            .col(platform_scores::Column::Platform)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    log::info!("Database schema ready");
    Ok(())
}
