use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Database {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub database: String,
}

impl Database {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    /// Sessions expire after this many minutes without activity.
    pub inactivity_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: Database,
    pub server: Server,
    pub session: Session,
}

impl Settings {
    /// Defaults, overridden by an optional `config.toml`, overridden by
    /// environment variables (`DATABASE_HOST`, `SERVER_PORT`, ...).
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("database.user", "clinica")?
            .set_default("database.password", "password")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", "5432")?
            .set_default("database.database", "clinica")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080i64)?
            .set_default("session.inactivity_minutes", 30i64)?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::default().separator("_"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::set_var;

    #[test]
    fn env_overrides_defaults() {
        set_var("DATABASE_USER", "clinica_test");
        set_var("SERVER_PORT", "9090");
        let settings = Settings::new().unwrap();
        assert_eq!(settings.database.user, "clinica_test");
        assert_eq!(settings.server.port, 9090);
        assert!(settings
            .database
            .url()
            .starts_with("postgres://clinica_test:"));
    }
}
