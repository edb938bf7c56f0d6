mod protocol;
mod server;
mod tools;
mod transport;

use std::time::Duration;

use clap::{ArgAction, Parser};
use tokio::io::{self, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use umami_core::{Config, UmamiClient};

#[derive(Parser)]
#[command(
    name = "umami-mcp",
    version,
    about = "Umami Analytics MCP server over stdio"
)]
struct Cli {
    /// Umami base URL (required for self-hosted, defaults to Umami Cloud)
    #[arg(long, env = "UMAMI_URL")]
    url: Option<String>,

    /// Umami Cloud API key; takes precedence over username/password
    #[arg(long, env = "UMAMI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "UMAMI_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "UMAMI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// User-Agent sent with every request
    #[arg(long, env = "UMAMI_USER_AGENT")]
    user_agent: Option<String>,

    /// Cloudflare Access service token id
    #[arg(long, env = "UMAMI_CF_ACCESS_CLIENT_ID")]
    cf_access_client_id: Option<String>,

    /// Cloudflare Access service token secret
    #[arg(long, env = "UMAMI_CF_ACCESS_CLIENT_SECRET", hide_env_values = true)]
    cf_access_client_secret: Option<String>,

    /// Log at debug level (ignored when RUST_LOG is set)
    #[arg(
        long,
        env = "UMAMI_DEBUG",
        action = ArgAction::SetTrue,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    debug: bool,

    /// Per-request timeout for Umami API calls
    #[arg(long, env = "UMAMI_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

impl Cli {
    fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            url: self.url,
            api_key: self.api_key,
            username: self.username,
            password: self.password,
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            cf_access_client_id: self.cf_access_client_id,
            cf_access_client_secret: self.cf_access_client_secret,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    // stdout carries the protocol.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let resolved = match cli.into_config().validate() {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    if resolved.targets_cloud_dashboard() {
        tracing::warn!(
            base_url = %resolved.base_url,
            "cloud.umami.is is the dashboard host; the API lives at https://api.umami.is"
        );
    }
    tracing::info!(
        mode = %resolved.mode,
        base_url = %resolved.base_url,
        protocol = protocol::PROTOCOL_VERSION,
        "umami-mcp starting"
    );

    let client = match UmamiClient::new(&resolved) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let server = server::McpServer::new(client);
    let stdin = BufReader::new(io::stdin());
    let stdout = io::stdout();

    if let Err(e) = transport::serve(stdin, stdout, &server).await {
        tracing::error!("stdio transport failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    /// Parse `args` with every `UMAMI_*` fallback removed, so the caller's
    /// environment cannot leak into the result.
    fn parse_without_env(args: &[&str]) -> Result<Cli, clap::Error> {
        let mut command = Cli::command();
        let ids: Vec<_> = command.get_arguments().map(|a| a.get_id().clone()).collect();
        for id in ids {
            command = command.mut_arg(id, |arg| arg.env(None::<&'static str>));
        }
        let matches = command.try_get_matches_from(args.iter().copied())?;
        Cli::from_arg_matches(&matches)
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse_without_env(&[
            "umami-mcp",
            "--url",
            "https://umami.example.com",
            "--username",
            "admin",
            "--password",
            "secret",
            "--timeout-secs",
            "5",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.url.as_deref(), Some("https://umami.example.com"));
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.user_agent.starts_with("umami-mcp/"));
    }

    #[test]
    fn debug_flag_defaults_off() {
        let cli = parse_without_env(&["umami-mcp", "--api-key", "k"]).unwrap();
        assert!(!cli.debug);
        assert_eq!(cli.timeout_secs, 30);
    }

    #[test]
    fn timeout_must_be_numeric() {
        assert!(parse_without_env(&["umami-mcp", "--timeout-secs", "soon"]).is_err());
    }

    #[test]
    fn debug_flag_is_boolish() {
        let cli = parse_without_env(&["umami-mcp", "--debug"]).unwrap();
        assert!(cli.debug);
    }
}
