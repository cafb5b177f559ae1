use crate::types::*;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::PathBuf;

pub const CONFIG_DIR_NAME: &str = ".artup";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Keys accepted by `artup config`.
pub const SETTING_KEYS: &[&str] = &[
    "content_dir",
    "kind",
    "policy",
    "proxy",
    "auto_detect_proxy",
    "proxy_probe_url",
    "probe_timeout_secs",
    "retries",
    "mirrors",
    "listing_bases",
];

pub fn get_user_config_dir() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join(CONFIG_DIR_NAME);
    fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn get_config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("ARTUP_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }
    let path = get_user_config_dir()?.join(CONFIG_FILE_NAME);
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

/// Load the config file (defaults when absent) without environment overrides.
pub fn load_stored_config() -> Result<ArtupConfig> {
    let config_path = get_config_file_path()?;

    if !config_path.exists() {
        return Ok(ArtupConfig::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Could not read config file at {}", config_path.display()))?;

    serde_json::from_str(&content).with_context(|| "Could not parse config file as JSON")
}

/// Load the config file and apply `ARTUP_*` environment overrides.
pub fn load_config() -> Result<ArtupConfig> {
    let mut config = load_stored_config()?;
    apply_env_overrides(&mut config.settings);
    Ok(config)
}

fn apply_env_overrides(settings: &mut ArtupSettings) {
    if let Ok(dir) = std::env::var("ARTUP_CONTENT_DIR") {
        settings.content_dir = dir;
    }

    if let Ok(proxy) = std::env::var("ARTUP_PROXY") {
        settings.proxy = proxy;
    }

    if let Ok(policy) = std::env::var("ARTUP_POLICY") {
        match policy.parse() {
            Ok(policy) => settings.policy = policy,
            Err(e) => tracing::warn!("Ignoring ARTUP_POLICY: {}", e),
        }
    }

    if let Ok(kind) = std::env::var("ARTUP_KIND") {
        match kind.parse() {
            Ok(kind) => settings.kind = kind,
            Err(e) => tracing::warn!("Ignoring ARTUP_KIND: {}", e),
        }
    }
}

pub fn save_config(config: &ArtupConfig) -> Result<()> {
    let config_path = get_config_file_path()?;
    let config_dir = config_path
        .parent()
        .ok_or_else(|| anyhow!("Invalid config path"))?;

    fs::create_dir_all(config_dir)?;

    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;

    Ok(())
}

pub fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                format!("_{}", c.to_lowercase())
            } else {
                c.to_string()
            }
        })
        .collect::<String>()
        .to_lowercase()
}

fn parse_bool(value: &str) -> bool {
    value.to_lowercase() == "true" || value == "1"
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn get_setting(settings: &ArtupSettings, key: &str) -> Result<String> {
    let value = match normalize_key(key).as_str() {
        "content_dir" => settings.content_dir.clone(),
        "kind" => format!("{:?}", settings.kind).to_lowercase(),
        "policy" => format!("{:?}", settings.policy).to_lowercase(),
        "proxy" => settings.proxy.clone(),
        "auto_detect_proxy" => settings.auto_detect_proxy.to_string(),
        "proxy_probe_url" => settings.proxy_probe_url.clone(),
        "probe_timeout_secs" => settings.probe_timeout_secs.to_string(),
        "retries" => settings.retries.to_string(),
        "mirrors" => settings.mirrors.join(","),
        "listing_bases" => settings.listing_bases.join(","),
        other => return Err(unknown_key(other)),
    };
    Ok(value)
}

pub fn set_setting(settings: &mut ArtupSettings, key: &str, value: &str) -> Result<()> {
    match normalize_key(key).as_str() {
        "content_dir" => settings.content_dir = value.to_string(),
        "kind" => settings.kind = value.parse().map_err(|e: String| anyhow!(e))?,
        "policy" => settings.policy = value.parse().map_err(|e: String| anyhow!(e))?,
        "proxy" => settings.proxy = value.to_string(),
        "auto_detect_proxy" => settings.auto_detect_proxy = parse_bool(value),
        "proxy_probe_url" => settings.proxy_probe_url = value.to_string(),
        "probe_timeout_secs" => {
            settings.probe_timeout_secs = value
                .parse()
                .with_context(|| format!("Invalid value for 'probe_timeout_secs': {}", value))?
        }
        "retries" => {
            settings.retries = value
                .parse()
                .with_context(|| format!("Invalid value for 'retries': {}", value))?
        }
        "mirrors" => settings.mirrors = parse_list(value),
        "listing_bases" => settings.listing_bases = parse_list(value),
        other => return Err(unknown_key(other)),
    }
    Ok(())
}

pub fn unset_setting(settings: &mut ArtupSettings, key: &str) -> Result<()> {
    let defaults = ArtupSettings::default();
    match normalize_key(key).as_str() {
        "content_dir" => settings.content_dir = defaults.content_dir,
        "kind" => settings.kind = defaults.kind,
        "policy" => settings.policy = defaults.policy,
        "proxy" => settings.proxy = defaults.proxy,
        "auto_detect_proxy" => settings.auto_detect_proxy = defaults.auto_detect_proxy,
        "proxy_probe_url" => settings.proxy_probe_url = defaults.proxy_probe_url,
        "probe_timeout_secs" => settings.probe_timeout_secs = defaults.probe_timeout_secs,
        "retries" => settings.retries = defaults.retries,
        "mirrors" => settings.mirrors = defaults.mirrors,
        "listing_bases" => settings.listing_bases = defaults.listing_bases,
        other => return Err(unknown_key(other)),
    }
    Ok(())
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow!(
        "'{}' is not a valid configuration setting. Valid settings: {}",
        key,
        SETTING_KEYS.join(", ")
    )
}
