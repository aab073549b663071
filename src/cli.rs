use crate::error::ConfigError;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

#[derive(Parser, Debug)]
#[command(
    name = "sockburst",
    author,
    version,
    about = "Synchronized websocket load harness",
    long_about = "sockburst is a synchronized websocket load harness. It opens a fleet of \
                  connections, parks them at a barrier, and releases them in one burst on \
                  operator command.\n\n\
                  Drive it over HTTP: GET /launch, /begin and /end on the control address. \
                  Watch it live on the /socket websocket."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the harness against a websocket service
    #[command(name = "run")]
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Generate man page
    Man,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Target websocket URL (ws:// or wss://)
    #[arg(required_unless_present = "config")]
    pub url: Option<String>,

    /// Origin header sent on every handshake
    #[arg(long)]
    pub origin: Option<String>,

    /// Extra handshake headers (can be specified multiple times)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Text payload each connection sends when released
    #[arg(short = 'p', long)]
    pub payload: Option<String>,

    /// Total requests per second across all connections (0 = full throttle)
    #[arg(short = 'r', long)]
    pub rate: Option<u32>,

    /// Number of connections to establish
    #[arg(short = 'c', long = "conn")]
    pub connections: Option<u64>,

    /// Traffic window once connections are released (e.g., 30s, 2m)
    #[arg(short = 'd', long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Telemetry push interval (e.g., 2s)
    #[arg(long = "stats-freq", value_parser = parse_duration)]
    pub stats_interval: Option<Duration>,

    /// Control plane listen address (e.g., :80, 127.0.0.1:8080)
    #[arg(long)]
    pub http_addr: Option<String>,

    /// Where to write the latency distribution
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Percentile ticks per half distance in the distribution file
    #[arg(long)]
    pub percentile_ticks: Option<u32>,

    /// Connection timeout (e.g., 10s)
    #[arg(long, value_parser = parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// Observer ping interval, must be shorter than --pong-wait
    #[arg(long, value_parser = parse_duration)]
    pub ping_period: Option<Duration>,

    /// How long an observer may go without answering a ping
    #[arg(long, value_parser = parse_duration)]
    pub pong_wait: Option<Duration>,

    /// Deadline for a single telemetry write
    #[arg(long, value_parser = parse_duration)]
    pub write_wait: Option<Duration>,

    /// Config file path (TOML)
    #[arg(short = 'f', long = "config")]
    pub config: Option<PathBuf>,

    /// Validate config and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn parse_headers(&self) -> Result<Vec<(String, String)>, ConfigError> {
        parse_headers(&self.headers)
    }
}

pub fn parse_headers(raw: &[String]) -> Result<Vec<(String, String)>, ConfigError> {
    raw.iter()
        .map(|h| {
            let (name, value) = h
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidHeader(h.clone()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidHeader(h.clone()));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output file path (default: sockburst.toml)
    #[arg(short, long, default_value = "sockburst.toml")]
    pub output: PathBuf,

    /// Target URL to include in config
    #[arg(short, long)]
    pub url: Option<String>,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "sockburst", &mut std::io::stdout());
}

pub fn generate_man_page() -> Result<(), std::io::Error> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    man.render(&mut std::io::stdout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "sockburst",
            "run",
            "ws://localhost:9000/echo",
            "-c",
            "500",
            "-r",
            "100",
            "-d",
            "1m",
            "--stats-freq",
            "500ms",
            "-H",
            "X-Token: abc",
            "--payload",
            "hello",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.url.as_deref(), Some("ws://localhost:9000/echo"));
        assert_eq!(args.connections, Some(500));
        assert_eq!(args.rate, Some(100));
        assert_eq!(args.duration, Some(Duration::from_secs(60)));
        assert_eq!(args.stats_interval, Some(Duration::from_millis(500)));
        assert_eq!(args.payload.as_deref(), Some("hello"));
        assert_eq!(
            args.parse_headers().unwrap(),
            vec![("X-Token".to_string(), "abc".to_string())]
        );
    }

    #[test]
    fn url_is_optional_with_config() {
        assert!(Cli::try_parse_from(["sockburst", "run"]).is_err());
        assert!(Cli::try_parse_from(["sockburst", "run", "-f", "load.toml"]).is_ok());
    }

    #[test]
    fn header_values_may_contain_colons() {
        let headers = parse_headers(&["Referer: http://example.com:8080/".to_string()]).unwrap();
        assert_eq!(headers[0].1, "http://example.com:8080/");
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert!(matches!(
            parse_headers(&["no-colon".to_string()]),
            Err(ConfigError::InvalidHeader(_))
        ));
        assert!(parse_headers(&[": value".to_string()]).is_err());
    }
}
