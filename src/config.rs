use crate::cli::{RunArgs, parse_headers};
use crate::error::ConfigError;
use crate::types::HarnessConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub load: LoadSettings,
    #[serde(default)]
    pub control: ControlSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Deserialize, Default)]
pub struct TargetConfig {
    pub url: Option<String>,
    pub origin: Option<String>,
    pub payload: Option<String>,
    #[serde(default, with = "humantime_serde::option")]
    pub connect_timeout: Option<Duration>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoadSettings {
    pub connections: Option<u64>,
    pub rate: Option<u32>,
    #[serde(default, with = "humantime_serde::option")]
    pub duration: Option<Duration>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ControlSettings {
    pub http_addr: Option<String>,
    #[serde(default, with = "humantime_serde::option")]
    pub stats_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub ping_period: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub pong_wait: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub write_wait: Option<Duration>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputSettings {
    pub dest: Option<PathBuf>,
    pub percentile_ticks: Option<u32>,
}

pub fn load_config(path: &Path) -> Result<TomlConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let content = interpolate_env_vars(&content)?;

    Ok(toml::from_str(&content)?)
}

static ENV_VAR: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    // Constant pattern; compiling it cannot fail.
    regex_lite::Regex::new(r"\$\{([^}]+)\}").unwrap_or_else(|_| unreachable!())
});

/// Expands `${VAR}` and `${VAR:-default}`. Comment lines are copied as-is.
fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            continue;
        }

        let mut last = 0;
        for cap in ENV_VAR.captures_iter(line) {
            let (Some(full), Some(expr)) = (cap.get(0), cap.get(1)) else {
                continue;
            };

            let (var_name, default) = match expr.as_str().split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (expr.as_str(), None),
            };

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => return Err(ConfigError::MissingEnv(var_name.to_string())),
                },
            };

            result.push_str(&line[last..full.start()]);
            result.push_str(&value);
            last = full.end();
        }
        result.push_str(&line[last..]);
    }

    Ok(result)
}

/// CLI flags win over the file, the file wins over defaults.
pub fn merge_config(args: &RunArgs, toml: Option<TomlConfig>) -> Result<HarnessConfig, ConfigError> {
    let toml = toml.unwrap_or_default();
    let defaults = HarnessConfig::default();

    let url = args
        .url
        .clone()
        .or(toml.target.url)
        .ok_or(ConfigError::MissingUrl)?;
    validate_scheme(&url)?;

    let mut headers = args.parse_headers()?;
    let file_headers: Vec<String> = toml
        .target
        .headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect();
    for (k, v) in parse_headers(&file_headers)? {
        if !headers.iter().any(|(hk, _)| hk.eq_ignore_ascii_case(&k)) {
            headers.push((k, v));
        }
    }

    let origin = args.origin.clone().or(toml.target.origin);
    let payload = args
        .payload
        .clone()
        .or(toml.target.payload)
        .unwrap_or(defaults.payload);

    let connections = args
        .connections
        .or(toml.load.connections)
        .unwrap_or(defaults.connections);
    if connections == 0 {
        return Err(ConfigError::Zero("connections"));
    }

    let stats_interval = args
        .stats_interval
        .or(toml.control.stats_interval)
        .unwrap_or(defaults.stats_interval);
    if stats_interval.is_zero() {
        return Err(ConfigError::Zero("stats interval"));
    }

    let write_wait = args
        .write_wait
        .or(toml.control.write_wait)
        .unwrap_or(defaults.write_wait);
    if write_wait.is_zero() {
        return Err(ConfigError::Zero("write wait"));
    }

    let pong_wait = args
        .pong_wait
        .or(toml.control.pong_wait)
        .unwrap_or(defaults.pong_wait);
    // Without an explicit ping period, keep it at 9/10 of the pong wait.
    let ping_period = args
        .ping_period
        .or(toml.control.ping_period)
        .unwrap_or(pong_wait * 9 / 10);
    if ping_period.is_zero() {
        return Err(ConfigError::Zero("ping period"));
    }
    if ping_period >= pong_wait {
        return Err(ConfigError::PingNotUnderPong {
            ping: ping_period,
            pong: pong_wait,
        });
    }

    let percentile_ticks = args
        .percentile_ticks
        .or(toml.output.percentile_ticks)
        .unwrap_or(defaults.percentile_ticks);
    if percentile_ticks == 0 {
        return Err(ConfigError::Zero("percentile ticks"));
    }

    let http_addr = args
        .http_addr
        .clone()
        .or(toml.control.http_addr)
        .map(|addr| normalize_listen_addr(&addr))
        .unwrap_or(defaults.http_addr);

    Ok(HarnessConfig {
        url,
        origin,
        headers,
        payload,
        rate: args.rate.or(toml.load.rate).unwrap_or(defaults.rate),
        connections,
        duration: args
            .duration
            .or(toml.load.duration)
            .unwrap_or(defaults.duration),
        connect_timeout: args
            .connect_timeout
            .or(toml.target.connect_timeout)
            .unwrap_or(defaults.connect_timeout),
        http_addr,
        stats_interval,
        ping_period,
        pong_wait,
        write_wait,
        dest: args
            .dest
            .clone()
            .or(toml.output.dest)
            .unwrap_or(defaults.dest),
        percentile_ticks,
    })
}

fn validate_scheme(url: &str) -> Result<(), ConfigError> {
    let scheme = url.split_once("://").map(|(s, _)| s).unwrap_or("");
    if scheme.eq_ignore_ascii_case("ws") || scheme.eq_ignore_ascii_case("wss") {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedScheme(url.to_string()))
    }
}

/// `:8080` listens on every interface.
pub fn normalize_listen_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    }
}
