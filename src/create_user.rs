//! Account signup.

use crate::error::{PortalError, PortalResult};
use crate::orm::users;
use crate::privilege::Rank;
use crate::session::hash_password;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{entity::*, query::*, ActiveValue::Set, Condition, DatabaseConnection};
use serde::Deserialize;
use validator::{Validate, ValidationError};

static MOBILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));

/// Mobile numbers are exactly 10 digits.
pub fn validate_mobile(mobile: &str) -> Result<(), ValidationError> {
    if MOBILE_RE.is_match(mobile) {
        Ok(())
    } else {
        Err(ValidationError::new("mobile_digits"))
    }
}

/// At least 8 characters with an upper case letter, a lower case letter, a
/// digit and a special character.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= 8;
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if long_enough && has_lower && has_upper && has_digit && has_special {
        Ok(())
    } else {
        Err(ValidationError::new("password_policy"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(custom = "validate_mobile")]
    pub mobile: String,
    #[validate(email, length(max = 200))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(custom = "validate_password")]
    pub password: String,
}

/// Creates a rank-4 account. Email and username must be unused.
pub async fn signup(db: &DatabaseConnection, form: NewUser) -> PortalResult<users::Model> {
    let form = NewUser {
        name: form.name.trim().to_owned(),
        mobile: form.mobile.trim().to_owned(),
        email: form.email.trim().to_owned(),
        username: form.username.trim().to_owned(),
        password: form.password,
    };

    form.validate().map_err(|e| {
        log::debug!("User registration validation failed: {}", e);
        PortalError::invalid(e.to_string())
    })?;

    let txn = db.begin().await?;

    let email_taken = users::Entity::find()
        .filter(users::Column::Email.eq(form.email.as_str()))
        .count(&txn)
        .await?;
    if email_taken > 0 {
        return Err(PortalError::invalid("Email already registered."));
    }

    let username_taken = users::Entity::find()
        .filter(users::Column::Username.eq(form.username.as_str()))
        .count(&txn)
        .await?;
    if username_taken > 0 {
        return Err(PortalError::invalid("Username already taken."));
    }

    let mut user = new_user_model(
        &form.name,
        &form.email,
        &form.username,
        &hash_password(&form.password)?,
    );
    user.mobile = Set(Some(form.mobile));
    let user = user.insert(&txn).await?;
    txn.commit().await?;

    log::info!("New user registered: {} (user_id: {})", user.username, user.id);
    Ok(user)
}

/// Active model for a default account with every optional field empty.
pub fn new_user_model(
    name: &str,
    email: &str,
    username: &str,
    password_hash: &str,
) -> users::ActiveModel {
    users::ActiveModel {
        name: Set(name.to_owned()),
        email: Set(email.to_owned()),
        username: Set(username.to_owned()),
        password_hash: Set(password_hash.to_owned()),
        mobile: Set(None),
        roll_number: Set(None),
        codechef: Set(None),
        hackerrank: Set(None),
        leetcode: Set(None),
        bio: Set(None),
        skills: Set(None),
        college: Set(None),
        branch: Set(None),
        year: Set(None),
        resume_filename: Set(None),
        certificates_filename: Set(None),
        is_admin: Set(false),
        privilege_level: Set(Rank::Student.level()),
        is_banned: Set(false),
        is_silenced: Set(false),
        silence_until: Set(None),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
}

/// Creates the admin account or promotes an existing one with the same
/// username or email, resetting its password.
pub async fn ensure_admin(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
) -> PortalResult<users::Model> {
    let password_hash = hash_password(password)?;

    let existing = users::Entity::find()
        .filter(
            Condition::any()
                .add(users::Column::Username.eq(username))
                .add(users::Column::Email.eq(email)),
        )
        .one(db)
        .await?;

    let admin = match existing {
        Some(user) => {
            let mut user: users::ActiveModel = user.into();
            user.username = Set(username.to_owned());
            user.password_hash = Set(password_hash);
            user.is_admin = Set(true);
            user.privilege_level = Set(Rank::Admin.level());
            user.update(db).await?
        }
        None => {
            let mut user = new_user_model("Administrator", email, username, &password_hash);
            user.is_admin = Set(true);
            user.privilege_level = Set(Rank::Admin.level());
            user.insert(db).await?
        }
    };

    log::info!("Admin account ready: {} (user_id: {})", admin.username, admin.id);
    Ok(admin)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> NewUser {
        NewUser {
            name: "Asha".to_string(),
            mobile: "9876543210".to_string(),
            email: "asha@example.com".to_string(),
            username: "asha".to_string(),
            password: "Str0ng!pass".to_string(),
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_mobile_must_be_ten_digits() {
        let mut f = form();
        f.mobile = "12345".to_string();
        assert!(f.validate().is_err());
        f.mobile = "12345abcde".to_string();
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password("Str0ng!pass").is_ok());
        assert!(validate_password("weakpass").is_err());
        assert!(validate_password("NoDigits!!").is_err());
        assert!(validate_password("n0upper!!").is_err());
        assert!(validate_password("Sh0rt!").is_err());
    }

    #[test]
    fn test_bad_email_rejected() {
        let mut f = form();
        f.email = "not-an-email".to_string();
        assert!(f.validate().is_err());
    }
}
