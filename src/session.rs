//! Credential verification and session tokens.
//!
//! A session is a row keyed by a random token. Every gated operation starts
//! by turning the caller's token into an [`Actor`] with [`resolve_actor`].

use crate::error::{PortalError, PortalResult};
use crate::orm::{sessions, users};
use crate::privilege::Actor;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::Utc;
use once_cell::sync::Lazy;
use sea_orm::{entity::*, query::*, ActiveValue::Set, Condition, DatabaseConnection};

static ARGON2: Lazy<Argon2<'static>> = Lazy::new(Argon2::default);

pub fn get_argon2() -> &'static Argon2<'static> {
    &ARGON2
}

/// Hashes a password into a PHC string.
pub fn hash_password(password: &str) -> PortalResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    get_argon2()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            PortalError::invalid("password could not be hashed")
        })
}

/// Checks a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => get_argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// A freshly opened session.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub actor: Actor,
    pub expires_at: chrono::NaiveDateTime,
}

/// Finds a user by username or email.
pub async fn find_by_identifier(
    db: &DatabaseConnection,
    identifier: &str,
) -> PortalResult<Option<users::Model>> {
    Ok(users::Entity::find()
        .filter(
            Condition::any()
                .add(users::Column::Username.eq(identifier))
                .add(users::Column::Email.eq(identifier)),
        )
        .one(db)
        .await?)
}

async fn authenticate(
    db: &DatabaseConnection,
    identifier: &str,
    password: &str,
) -> PortalResult<users::Model> {
    let identifier = identifier.trim();
    if identifier.is_empty() || password.is_empty() {
        return Err(PortalError::invalid(
            "Please enter username/email and password",
        ));
    }

    match find_by_identifier(db, identifier).await? {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        _ => {
            log::debug!("login failure for {}", identifier);
            Err(PortalError::Unauthenticated)
        }
    }
}

/// Opens a session for a user.
pub async fn new_session(
    db: &DatabaseConnection,
    user: &users::Model,
) -> PortalResult<LoginSession> {
    let now = Utc::now().naive_utc();
    let hours = crate::app_config::sessions().lifetime_hours;
    let expires_at = now + chrono::Duration::hours(i64::from(hours));
    let token = uuid::Uuid::new_v4().to_string();

    sessions::ActiveModel {
        token: Set(token.clone()),
        user_id: Set(user.id),
        created_at: Set(now),
        expires_at: Set(expires_at),
    }
    .insert(db)
    .await?;

    Ok(LoginSession {
        token,
        actor: Actor::from_user(user),
        expires_at,
    })
}

/// Verifies credentials (username or email) and opens a session.
pub async fn login(
    db: &DatabaseConnection,
    identifier: &str,
    password: &str,
) -> PortalResult<LoginSession> {
    let user = authenticate(db, identifier, password).await?;
    log::info!("User logged in: user_id={}", user.id);
    new_session(db, &user).await
}

/// Like [`login`], but only for accounts carrying the admin flag.
pub async fn admin_login(
    db: &DatabaseConnection,
    identifier: &str,
    password: &str,
) -> PortalResult<LoginSession> {
    let user = authenticate(db, identifier, password).await?;
    if !user.is_admin {
        log::warn!("Admin login refused for user_id={}", user.id);
        return Err(PortalError::forbidden("Admin privileges required."));
    }
    log::info!("Admin logged in: user_id={}", user.id);
    new_session(db, &user).await
}

/// Ends a session. Unknown tokens are ignored.
pub async fn logout(db: &DatabaseConnection, token: &str) -> PortalResult<()> {
    sessions::Entity::delete_by_id(token.to_owned())
        .exec(db)
        .await?;
    Ok(())
}

/// Resolves the acting user from a session token.
///
/// Rank and admin flag are read fresh from the user row, so moderation and
/// privilege edits take effect on the next operation.
pub async fn resolve_actor(db: &DatabaseConnection, token: Option<&str>) -> PortalResult<Actor> {
    let token = token.ok_or(PortalError::Unauthenticated)?;

    let session = sessions::Entity::find_by_id(token.to_owned())
        .one(db)
        .await?
        .ok_or(PortalError::Unauthenticated)?;

    if session.expires_at <= Utc::now().naive_utc() {
        sessions::Entity::delete_by_id(session.token).exec(db).await?;
        return Err(PortalError::Unauthenticated);
    }

    let user = users::Entity::find_by_id(session.user_id)
        .one(db)
        .await?
        .ok_or(PortalError::Unauthenticated)?;

    Ok(Actor::from_user(&user))
}

/// Deletes expired sessions, returning how many were removed.
pub async fn purge_expired_sessions(db: &DatabaseConnection) -> PortalResult<u64> {
    let res = sessions::Entity::delete_many()
        .filter(sessions::Column::ExpiresAt.lte(Utc::now().naive_utc()))
        .exec(db)
        .await?;
    if res.rows_affected > 0 {
        log::debug!("Purged {} expired sessions", res.rows_affected);
    }
    Ok(res.rows_affected)
}
