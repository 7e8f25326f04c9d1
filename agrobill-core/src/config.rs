use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration read from the process environment.
///
/// `.env` files are honoured through `dotenv` before this is built.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub max_connections: u32,
    /// How long a request waits for a pooled connection.
    pub acquire_timeout: Duration,
    /// Server-side `statement_timeout` applied to every connection.
    pub statement_timeout: Duration,
    /// Bearer tokens are only checked when a secret is configured.
    pub jwt_secret: Option<String>,
    pub run_migrations: bool,
}

impl Config {
    /// Builds the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a numeric variable
    /// does not parse.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            database_url,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SERVER_PORT", 3000)?,
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            acquire_timeout: Duration::from_secs(parse_var("DATABASE_ACQUIRE_TIMEOUT_SECONDS", 5)?),
            statement_timeout: Duration::from_millis(parse_var("DATABASE_STATEMENT_TIMEOUT_MS", 15_000)?),
            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            run_migrations: parse_var("RUN_MIGRATIONS", true)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("Invalid {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u16 = parse_var("AGROBILL_TEST_UNSET_VARIABLE", 4242).expect("default");
        assert_eq!(value, 4242);
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            database_url: "postgres://localhost/agrobill".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            max_connections: 4,
            acquire_timeout: Duration::from_secs(1),
            statement_timeout: Duration::from_secs(1),
            jwt_secret: None,
            run_migrations: false,
        };
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}
