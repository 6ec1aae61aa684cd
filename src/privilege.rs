//! Privilege ranks and the acting user.
//!
//! Lower numeric rank means more privilege:
//! - 1: Admin (all functions)
//! - 2: Staff (forum announcements, calendar events)
//! - 3: Coordinator (create events in events tab)
//! - 4: Student/Default (doubts, study posts only in forum)
//!
//! The admin flag on a user is stored separately from the rank. Admin-only
//! operations check both.

use crate::error::{PortalError, PortalResult};
use crate::orm::users;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Admin = 1,
    Staff = 2,
    Coordinator = 3,
    Student = 4,
}

impl Rank {
    pub fn level(self) -> i32 {
        self as i32
    }

    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            1 => Some(Rank::Admin),
            2 => Some(Rank::Staff),
            3 => Some(Rank::Coordinator),
            4 => Some(Rank::Student),
            _ => None,
        }
    }

    /// Unknown levels are treated as the least privileged rank.
    pub fn from_level_or_default(level: i32) -> Self {
        Self::from_level(level).unwrap_or(Rank::Student)
    }

    /// True when this rank is at least as privileged as `required`.
    pub fn satisfies(self, required: Rank) -> bool {
        self.level() <= required.level()
    }
}

impl Default for Rank {
    fn default() -> Self {
        Rank::Student
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rank::Admin => "Admin",
            Rank::Staff => "Staff",
            Rank::Coordinator => "Coordinator",
            Rank::Student => "Student",
        };
        write!(f, "{}", name)
    }
}

/// The user an operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub rank: Rank,
    pub is_admin: bool,
}

impl Actor {
    pub fn from_user(user: &users::Model) -> Self {
        Self {
            user_id: user.id,
            rank: Rank::from_level_or_default(user.privilege_level),
            is_admin: user.is_admin,
        }
    }

    /// Fails with `Forbidden` when the actor's rank is below `required`.
    pub fn authorize(&self, required: Rank) -> PortalResult<()> {
        authorize(self.rank, required)
    }

    /// Rank 1 and the admin flag.
    pub fn has_admin(&self) -> bool {
        self.rank == Rank::Admin && self.is_admin
    }

    pub fn require_admin(&self) -> PortalResult<()> {
        if self.has_admin() {
            Ok(())
        } else {
            log::warn!("Refused admin action for user_id={}", self.user_id);
            Err(PortalError::forbidden("Admin privileges required."))
        }
    }

    pub fn is(&self, user_id: i32) -> bool {
        self.user_id == user_id
    }
}

/// Fails with `Forbidden` when `rank` is numerically greater than `required`.
pub fn authorize(rank: Rank, required: Rank) -> PortalResult<()> {
    if rank.satisfies(required) {
        Ok(())
    } else {
        Err(PortalError::forbidden(format!(
            "Privilege level {} or higher required.",
            required.level()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(rank: Rank, is_admin: bool) -> Actor {
        Actor {
            user_id: 1,
            rank,
            is_admin,
        }
    }

    #[test]
    fn test_rank_ordering() {
        assert!(Rank::Admin.satisfies(Rank::Student));
        assert!(Rank::Staff.satisfies(Rank::Coordinator));
        assert!(Rank::Coordinator.satisfies(Rank::Coordinator));
        assert!(!Rank::Student.satisfies(Rank::Coordinator));
    }

    #[test]
    fn test_authorize_forbids_lower_privilege() {
        assert!(authorize(Rank::Staff, Rank::Staff).is_ok());
        assert!(matches!(
            authorize(Rank::Coordinator, Rank::Staff),
            Err(PortalError::Forbidden(_))
        ));
    }

    #[test]
    fn test_unknown_level_is_student() {
        assert_eq!(Rank::from_level(0), None);
        assert_eq!(Rank::from_level_or_default(9), Rank::Student);
        assert_eq!(Rank::from_level(3), Some(Rank::Coordinator));
    }

    #[test]
    fn test_admin_requires_rank_and_flag() {
        assert!(actor(Rank::Admin, true).require_admin().is_ok());
        // Rank 1 without the flag is not enough.
        assert!(actor(Rank::Admin, false).require_admin().is_err());
        // An admin who set rank 2 on themselves keeps the flag but loses admin operations.
        assert!(actor(Rank::Staff, true).require_admin().is_err());
        assert!(actor(Rank::Staff, true).authorize(Rank::Staff).is_ok());
    }
}
