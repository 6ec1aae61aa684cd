//! CloudRoom campus portal core: accounts and privilege ranks, team
//! formation, the forum with votes and moderation, events, messaging and the
//! coding leaderboard. Every operation takes the database connection and the
//! acting user explicitly.

pub mod app_config;
pub mod create_user;
pub mod db;
pub mod directory;
pub mod error;
pub mod events;
pub mod forum;
pub mod leaderboard;
pub mod messages;
pub mod orm;
pub mod privilege;
pub mod projects;
pub mod session;
pub mod team;
pub mod user;

pub use error::{PortalError, PortalResult};
pub use privilege::{Actor, Rank};
