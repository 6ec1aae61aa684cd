//! Portal settings.
//!
//! Read once, from `cloudroom.toml` when it exists and from `CLOUDROOM_*`
//! environment variables, which win over the file. Nested keys use a double
//! underscore: `CLOUDROOM_TEAMS__DEFAULT_SIZE_LIMIT=5`. Anything left unset
//! keeps its default. Keep database credentials in the environment.

use config::{Config, ConfigError, Environment, File, FileFormat};
use once_cell::sync::OnceCell;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "cloudroom.toml";

static SETTINGS: OnceCell<PortalConfig> = OnceCell::new();

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Overridden by `DATABASE_URL` in the CLI.
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://cloudroom.db?mode=rwc".to_owned(),
            max_connections: 10,
            min_connections: 1,
            sqlx_logging: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub lifetime_hours: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_hours: 24 * 7,
        }
    }
}

/// Which ranks may post where, and listing size.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    /// Lowercase names of the categories rank 4 may post in.
    pub student_categories: Vec<String>,
    /// Lowercase names of the categories closed to rank 3.
    pub staff_categories: Vec<String>,
    pub posts_per_page: u64,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            student_categories: ["questions", "study", "doubts"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            staff_categories: vec!["announcements".to_owned()],
            posts_per_page: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Used when a team is created without a size limit.
    pub default_size_limit: i32,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            default_size_limit: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub portal_name: String,
    pub database: DatabaseConfig,
    pub sessions: SessionConfig,
    pub forum: ForumConfig,
    pub teams: TeamConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            portal_name: "CloudRoom".to_owned(),
            database: DatabaseConfig::default(),
            sessions: SessionConfig::default(),
            forum: ForumConfig::default(),
            teams: TeamConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Reads `path` (skipped if missing) and then the environment.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("CLOUDROOM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

fn load_or_default(path: &str) -> PortalConfig {
    PortalConfig::from_file(path).unwrap_or_else(|e| {
        log::warn!("Ignoring unreadable settings in {}: {}", path, e);
        PortalConfig::default()
    })
}

/// Loads the settings. Later calls, and any accessor used before this,
/// keep whatever was loaded first.
pub fn init() {
    let settings = get();
    log::info!(
        "{} settings loaded (forum page size {}, default team size {})",
        settings.portal_name,
        settings.forum.posts_per_page,
        settings.teams.default_size_limit
    );
}

pub fn get() -> &'static PortalConfig {
    SETTINGS.get_or_init(|| load_or_default(CONFIG_FILE))
}

pub fn database() -> DatabaseConfig {
    get().database.clone()
}

pub fn sessions() -> SessionConfig {
    get().sessions.clone()
}

pub fn forum() -> ForumConfig {
    get().forum.clone()
}

pub fn teams() -> TeamConfig {
    get().teams.clone()
}
