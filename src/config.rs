use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Clamp negative team-share contributions (secondary rate above its
    /// parent's) to zero instead of letting them reduce the parent's total.
    pub clamp_negative_team_share: bool,
    /// Staleness tolerance applied when a reader does not state its own.
    pub default_max_staleness_ms: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let clamp_negative_team_share = match env_map
            .get("CLAMP_NEGATIVE_TEAM_SHARE")
            .map(|s| s.as_str())
            .unwrap_or("false")
        {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CLAMP_NEGATIVE_TEAM_SHARE".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let default_max_staleness_ms = env_map
            .get("DEFAULT_MAX_STALENESS_MS")
            .map(|s| s.as_str())
            .unwrap_or("60000")
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "DEFAULT_MAX_STALENESS_MS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            clamp_negative_team_share,
            default_max_staleness_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.clamp_negative_team_share);
        assert_eq!(config.default_max_staleness_ms, 60_000);
    }

    #[test]
    fn test_missing_database_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_clamp_flag_parsing() {
        let mut env_map = setup_required_env();
        env_map.insert("CLAMP_NEGATIVE_TEAM_SHARE".to_string(), "true".to_string());
        let config = Config::from_env_map(env_map.clone()).unwrap();
        assert!(config.clamp_negative_team_share);

        env_map.insert("CLAMP_NEGATIVE_TEAM_SHARE".to_string(), "maybe".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => {
                assert_eq!(k, "CLAMP_NEGATIVE_TEAM_SHARE")
            }
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_staleness() {
        let mut env_map = setup_required_env();
        env_map.insert("DEFAULT_MAX_STALENESS_MS".to_string(), "soon".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEFAULT_MAX_STALENESS_MS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
