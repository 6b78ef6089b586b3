//! Process configuration.
//!
//! Every setting is a command-line flag with an environment-variable
//! fallback, so the same binary runs unchanged under a process manager,
//! a container, or a shell.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::app::{DEFAULT_BODY_LIMIT, ResponseSchemaMode};

#[derive(Clone, Debug, Parser)]
#[command(name = "lintel", version, about = "Minimal HTTP server with phased request hooks")]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "LINTEL_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "LINTEL_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "LINTEL_LOG", default_value = "debug")]
    pub log_level: String,

    /// Seconds to wait for in-flight requests on shutdown; 0 waits forever.
    #[arg(long, env = "LINTEL_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    pub drain_timeout_secs: u64,

    /// Maximum request body size in bytes.
    #[arg(long, env = "LINTEL_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,

    /// What to do with responses that do not match their declared schema.
    #[arg(long, env = "LINTEL_RESPONSE_SCHEMAS", value_enum, default_value_t = ResponseSchemaMode::Warn)]
    pub response_schemas: ResponseSchemaMode,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        (self.drain_timeout_secs > 0).then(|| Duration::from_secs(self.drain_timeout_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            log_level: "debug".to_owned(),
            drain_timeout_secs: 30,
            body_limit: DEFAULT_BODY_LIMIT,
            response_schemas: ResponseSchemaMode::Warn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_flag_defaults() {
        let parsed = Config::try_parse_from(["lintel"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.addr(), default.addr());
        assert_eq!(parsed.addr().to_string(), "0.0.0.0:3000");
        assert_eq!(parsed.body_limit, default.body_limit);
        assert_eq!(parsed.response_schemas, ResponseSchemaMode::Warn);
        assert_eq!(parsed.drain_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn flags_override_defaults() {
        let c = Config::try_parse_from([
            "lintel",
            "--host", "127.0.0.1",
            "--port", "8080",
            "--drain-timeout-secs", "0",
            "--response-schemas", "enforce",
        ])
        .unwrap();
        assert_eq!(c.addr().to_string(), "127.0.0.1:8080");
        assert_eq!(c.drain_timeout(), None);
        assert_eq!(c.response_schemas, ResponseSchemaMode::Enforce);
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Config::try_parse_from(["lintel", "--port", "70000"]).is_err());
    }
}
