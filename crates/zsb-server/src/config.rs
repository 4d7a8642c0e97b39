use std::path::PathBuf;
use zsb_core::Port;

/// Backend configuration, collected once at startup from environment
/// variables. Every variable has a workable default for local play.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,
    /// Host clients and match servers use to reach this backend.
    pub public_host: String,
    /// HTTP port of this backend, handed to spawned match servers.
    pub backend_port: Port,
    /// Discovery protocol bind address.
    pub discovery_addr: String,
    /// Match-server executable.
    pub server_bin: PathBuf,
    /// Extra arguments for the match server; `--headless` plus an
    /// optional project path.
    pub server_args: Vec<String>,
    /// First match-server port.
    pub port_base: Port,
    /// Size of the match-server port range.
    pub port_count: usize,
    /// Minimum count of servers kept in {Starting, Ready}.
    pub min_pool: usize,
    /// Player capacity per match server.
    pub max_players: usize,
    /// Pre-shared secret authenticating match-server calls and commits.
    pub server_secret: String,
    /// Optional path overriding the embedded seed catalog.
    pub seed_file: Option<PathBuf>,
}

fn var(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let backend_port = parse("ZSB_BACKEND_PORT", 8080);
        Self {
            bind_addr: var("ZSB_BIND_ADDR", &format!("0.0.0.0:{}", backend_port)),
            public_host: var("ZSB_PUBLIC_HOST", "127.0.0.1"),
            backend_port,
            discovery_addr: var("ZSB_DISCOVERY_ADDR", "0.0.0.0:9050"),
            server_bin: PathBuf::from(var("ZSB_SERVER_BIN", "./match-server")),
            server_args: std::env::var("ZSB_SERVER_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|_| vec!["--headless".to_string()]),
            port_base: parse("ZSB_PORT_BASE", 27015),
            port_count: parse("ZSB_PORT_COUNT", 64),
            min_pool: parse("ZSB_MIN_POOL", 0),
            max_players: parse("ZSB_MAX_PLAYERS", 8),
            server_secret: var("ZSB_SERVER_SECRET", "dev-secret-change-me"),
            seed_file: std::env::var("ZSB_SEED_FILE").ok().map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn defaults_are_self_consistent() {
        let config = Config::from_env();
        assert!(config.port_count > 0);
        assert!(config.max_players >= 1);
        assert_eq!(config.server_args[0], "--headless");
    }
}
