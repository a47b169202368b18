// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Address to bind the HTTP server to.
    pub bind_addr: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory containing pre-built frontend files to serve.
    /// When set, unmatched routes fall back to files under this path.
    pub static_dir: Option<PathBuf>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:gm_wiki.db?mode=rwc`)
    /// - `BIND_ADDR` - Listen address (default: `0.0.0.0`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `STATIC_DIR` - Path to frontend dist directory for static file serving
    /// - `LOG_LEVEL` - Fallback tracing filter (default: `info`)
    ///
    /// CLI flags:
    /// - `--database <URL>` - Override the database URL
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = Self::parse_cli_value(args, "--database")
            .or_else(|| env("DATABASE_URL"))
            .unwrap_or_else(|| "sqlite:gm_wiki.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let bind_addr = env("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let static_dir = env("STATIC_DIR").map(PathBuf::from);
        let log_level = env("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Config {
            database_url,
            bind_addr,
            port,
            static_dir,
            log_level,
        }
    }

    /// `host:port` for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(&args(&["gm-wiki"]), |_| None);
        assert_eq!(config.database_url, "sqlite:gm_wiki.db?mode=rwc");
        assert_eq!(config.listen_addr(), "0.0.0.0:3000");
        assert!(config.static_dir.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_cli_overrides_env() {
        let env = |key: &str| match key {
            "PORT" => Some("4000".to_string()),
            "DATABASE_URL" => Some("sqlite:env.db".to_string()),
            _ => None,
        };
        let config = Config::from_sources(
            &args(&["gm-wiki", "--port", "8080", "--database", "sqlite::memory:"]),
            env,
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite::memory:");

        let config = Config::from_sources(&args(&["gm-wiki"]), env);
        assert_eq!(config.port, 4000);
        assert_eq!(config.database_url, "sqlite:env.db");
    }

    #[test]
    fn test_bad_port_falls_back() {
        let config = Config::from_sources(&args(&["gm-wiki", "--port", "lots"]), |_| None);
        assert_eq!(config.port, 3000);
    }
}
