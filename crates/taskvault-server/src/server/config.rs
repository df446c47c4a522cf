use anyhow::{Context, bail};
use axum::http::HeaderValue;
use clap::Parser;
use core::fmt;
use core::num::NonZeroU32;
use core::time::Duration;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration for the `taskvault-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suitable for local
/// development. Only the signing secret has no default.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskvault-server",
    version,
    about = "An HTTP service for per-user task lists"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Secret used to sign and verify HS256 bearer tokens.
    ///
    /// Tokens issued under one secret are rejected after it changes, so every
    /// existing client is handed a fresh identity.
    ///
    /// Environment variable: `SECRET_KEY`
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Origin allowed to make cross-origin requests. Use `*` to allow any
    /// origin, in which case credentials are not allowed.
    ///
    /// Environment variable: `CORS`
    #[arg(long, env = "CORS", default_value_t = String::from("http://localhost:3000"))]
    pub cors: String,

    /// Lifetime of issued tokens, in hours.
    ///
    /// Environment variable: `TOKEN_TTL_HOURS`
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = 72)]
    pub token_ttl_hours: u64,

    /// Maximum requests per client IP per minute. `0` disables rate limiting.
    ///
    /// Environment variable: `RATE_LIMIT_PER_MINUTE`
    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value_t = 5)]
    pub rate_limit_per_minute: u32,

    /// Maximum time a single request may take before it is answered with
    /// `408 Request Timeout`.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_SECS`
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// File that receives a copy of the log, in addition to the console.
    /// Appended to if it exists.
    ///
    /// Environment variable: `LOG_FILE`
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Which origins CORS admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigin {
    Any,
    Exact(HeaderValue),
}

#[derive(Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub secret_key: String,
    pub cors_origin: CorsOrigin,
    pub token_ttl: Duration,
    pub rate_limit_per_minute: Option<NonZeroU32>,
    pub request_timeout: Duration,
    pub log_file: Option<PathBuf>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("server_addr", &self.server_addr)
            .field("secret_key", &"<redacted>")
            .field("cors_origin", &self.cors_origin)
            .field("token_ttl", &self.token_ttl)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("request_timeout", &self.request_timeout)
            .field("log_file", &self.log_file)
            .finish()
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let server_addr = args
            .server_addr
            .parse()
            .with_context(|| format!("SERVER_ADDR ({}) is not a socket address", args.server_addr))?;

        if args.secret_key.trim().is_empty() {
            bail!("SECRET_KEY must not be empty");
        }

        let cors_origin = match args.cors.trim() {
            "" => bail!("CORS must not be empty"),
            "*" => CorsOrigin::Any,
            origin => CorsOrigin::Exact(
                HeaderValue::from_str(origin)
                    .with_context(|| format!("CORS ({origin}) is not a valid origin"))?,
            ),
        };

        if args.token_ttl_hours == 0 {
            bail!("TOKEN_TTL_HOURS must be greater than 0");
        }
        let token_ttl = args
            .token_ttl_hours
            .checked_mul(60 * 60)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow::anyhow!("Overflow in token TTL computation"))?;

        if args.request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than 0");
        }

        if let Some(path) = &args.log_file {
            if path.file_name().is_none() {
                bail!("LOG_FILE ({}) must name a file", path.display());
            }
        }

        Ok(Self {
            server_addr,
            secret_key: args.secret_key,
            cors_origin,
            token_ttl,
            rate_limit_per_minute: NonZeroU32::new(args.rate_limit_per_minute),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            log_file: args.log_file,
        })
    }
}

#[cfg(test)]
impl ServerConfig {
    /// Configuration used by router tests: rate limiting off, any origin.
    pub fn for_tests() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            secret_key: "test-secret".into(),
            cors_origin: CorsOrigin::Any,
            token_ttl: Duration::from_secs(72 * 60 * 60),
            rate_limit_per_minute: None,
            request_timeout: Duration::from_secs(30),
            log_file: None,
        }
    }
}
