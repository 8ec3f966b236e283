//! Server configuration and INI loading.
//!
//! The file format is the classic `server.ini`:
//!
//! ```ini
//! [Server]
//! port = 25565
//! max_players = 16
//! motd = A Minecraft Server
//! spawn_x = 0
//! spawn_y = 64
//! spawn_z = 0
//! ```
//!
//! Section and key names are matched case-insensitively. Numeric values out of
//! range for their field are clamped rather than rejected; values that are not
//! numbers at all are an error.

use config::{Config, File, FileFormat, Map, Value};
use log::{info, warn};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "server.ini";
pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_MAX_PLAYERS: u8 = 16;
pub const DEFAULT_MOTD: &str = "A Minecraft Server";

const SECTION: &str = "server";

/// Errors raised while loading configuration. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid value {value:?} for '{key}'")]
    InvalidValue { key: String, value: String },
}

/// Block coordinates players are placed at after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnPoint {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self { x: 0, y: 64, z: 0 }
    }
}

/// Immutable settings shared by every part of the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_players: u8,
    pub motd: String,
    pub spawn: SpawnPoint,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_players: DEFAULT_MAX_PLAYERS,
            motd: DEFAULT_MOTD.to_string(),
            spawn: SpawnPoint::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration for startup.
    ///
    /// An explicitly given file must exist. Without one, `server.ini` in the
    /// working directory is used if present, otherwise defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_ini_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.is_file() {
                    Self::from_ini_file(default_path)
                } else {
                    warn!(
                        "No {} found, using default configuration",
                        DEFAULT_CONFIG_PATH
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_ini_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let source = File::new(&path.to_string_lossy(), FileFormat::Ini).required(true);
        let settings = Config::builder().add_source(source).build()?;
        Self::from_settings(settings)
    }

    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Ini))
            .build()?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let root: Map<String, Value> = settings.try_deserialize()?;
        let section = match lookup(&root, SECTION) {
            Some(value) => value.clone().into_table()?,
            None => Map::new(),
        };

        let mut config = Self::default();

        if let Some(port) = read_int(&section, "port")? {
            config.port = port.clamp(0, i64::from(u16::MAX)) as u16;
        }
        if let Some(max_players) = read_int(&section, "max_players")? {
            config.max_players = max_players.clamp(0, i64::from(u8::MAX)) as u8;
        }
        if let Some(motd) = read_string(&section, "motd")? {
            config.motd = motd;
        }
        if let Some(host) = read_string(&section, "host")? {
            config.host = host.parse().map_err(|_| ConfigError::InvalidValue {
                key: "host".to_string(),
                value: host.clone(),
            })?;
        }
        if let Some(x) = read_coordinate(&section, "spawn_x")? {
            config.spawn.x = x;
        }
        if let Some(y) = read_coordinate(&section, "spawn_y")? {
            config.spawn.y = y;
        }
        if let Some(z) = read_coordinate(&section, "spawn_z")? {
            config.spawn.z = z;
        }

        Ok(config)
    }
}

fn lookup<'a>(table: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    table
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn read_string(table: &Map<String, Value>, key: &str) -> Result<Option<String>, ConfigError> {
    match lookup(table, key) {
        Some(value) => Ok(Some(value.clone().into_string()?.trim().to_string())),
        None => Ok(None),
    }
}

fn read_int(table: &Map<String, Value>, key: &str) -> Result<Option<i64>, ConfigError> {
    match read_string(table, key)? {
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

fn read_coordinate(table: &Map<String, Value>, key: &str) -> Result<Option<i32>, ConfigError> {
    match read_int(table, key)? {
        Some(value) => i32::try_from(value)
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }),
        None => Ok(None),
    }
}
