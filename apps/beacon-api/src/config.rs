use std::time::Duration;

/// Beacon API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,
    /// HMAC secret used to verify client JWTs (HS256).
    pub jwt_secret: String,
    /// Port the HTTP + Socket.IO server binds to.
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// How long a client may take to complete the Socket.IO handshake.
    pub handshake_timeout: Duration,
    /// Upper bound on a single chat-message write. The sender is told the
    /// write failed once it passes. Postgres is given a shorter
    /// [`Config::statement_timeout`] so a write the sender saw fail is rolled
    /// back rather than committed late; only a commit racing the network
    /// round-trip can still slip through.
    pub persist_timeout: Duration,
    /// Maximum number of messages returned by the history endpoints.
    pub history_limit: i64,
    /// Keep the timestamp the client attached to a chat message instead of
    /// stamping server receipt time.
    pub trust_client_timestamps: bool,
}

impl Config {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.into(),
            port: 5000,
            cors_origins: Vec::new(),
            handshake_timeout: Duration::from_secs(10),
            persist_timeout: Duration::from_secs(10),
            history_limit: 100,
            trust_client_timestamps: true,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        let defaults = Self::new(required_var("JWT_SECRET"));
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            port: parsed_var("PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            handshake_timeout: parsed_var("HANDSHAKE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.handshake_timeout),
            persist_timeout: parsed_var("PERSIST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.persist_timeout),
            history_limit: parsed_var::<i64>("HISTORY_LIMIT")
                .map(|n| n.clamp(1, 500))
                .unwrap_or(defaults.history_limit),
            trust_client_timestamps: parsed_var("TRUST_CLIENT_TIMESTAMPS")
                .unwrap_or(defaults.trust_client_timestamps),
            ..defaults
        }
    }

    /// Server-side bound for message INSERTs: four fifths of
    /// `persist_timeout`, leaving the rest for pool checkout and the
    /// round-trip.
    pub fn statement_timeout(&self) -> Duration {
        self.persist_timeout * 4 / 5
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_documented_defaults() {
        let config = Config::new("secret");
        assert_eq!(config.jwt_secret, "secret");
        assert_eq!(config.port, 5000);
        assert!(config.database_url.is_none());
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert!(config.trust_client_timestamps);
    }

    #[test]
    fn statement_timeout_is_shorter_than_persist_timeout() {
        let mut config = Config::new("secret");
        assert_eq!(config.statement_timeout(), Duration::from_secs(8));
        config.persist_timeout = Duration::from_millis(250);
        assert_eq!(config.statement_timeout(), Duration::from_millis(200));
    }
}
