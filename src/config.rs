use crate::error::{BadEnvVarSnafu, ParseEnvVarSnafu, RosterResult};
use dotenvy::var;
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    db_config: Arc<DbConfig>,
    server_config: Arc<ServerConfig>,
}

impl RuntimeConfiguration {
    pub fn new() -> RosterResult<Self> {
        Ok(Self {
            db_config: Arc::new(DbConfig::new()?),
            server_config: Arc::new(ServerConfig::new()?),
        })
    }

    pub fn db_config(&self) -> Arc<DbConfig> {
        self.db_config.clone()
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        self.server_config.clone()
    }
}

#[derive(Debug)]
pub struct DbConfig {
    user: String,
    password: SecretString,
    path: String,
    port: u16,
    database: String,
}

impl DbConfig {
    pub fn new() -> RosterResult<Self> {
        let get_env_var = |name| var(name).context(BadEnvVarSnafu { name });

        Ok(Self {
            user: get_env_var("DB_USER")?,
            password: SecretString::from(get_env_var("DB_PASSWORD")?),
            path: get_env_var("DB_PATH")?,
            port: get_env_var("DB_PORT")?
                .parse()
                .context(ParseEnvVarSnafu { name: "DB_PORT" })?,
            database: get_env_var("DB_NAME")?,
        })
    }

    pub fn get_db_path(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose_secret(),
            self.path,
            self.port,
            self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_ip: String,
    pub max_connections: u32,
    pub default_page_size: i64,
}

impl ServerConfig {
    pub const DEFAULT_SERVER_IP: &'static str = "127.0.0.1:8080";
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    pub const DEFAULT_PAGE_SIZE: i64 = 25;

    ///every value here is optional, missing ones fall back to the defaults above
    pub fn new() -> RosterResult<Self> {
        Self::from_lookup(|name| var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> RosterResult<Self> {
        let server_ip =
            lookup("ROSTER_SERVER_IP").unwrap_or_else(|| Self::DEFAULT_SERVER_IP.to_string());

        let max_connections = match lookup("ROSTER_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse().context(ParseEnvVarSnafu {
                name: "ROSTER_MAX_CONNECTIONS",
            })?,
            None => Self::DEFAULT_MAX_CONNECTIONS,
        };

        let default_page_size = match lookup("ROSTER_PAGE_SIZE") {
            Some(raw) => raw.trim().parse().context(ParseEnvVarSnafu {
                name: "ROSTER_PAGE_SIZE",
            })?,
            None => Self::DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            server_ip,
            max_connections,
            default_page_size,
        })
    }
}
