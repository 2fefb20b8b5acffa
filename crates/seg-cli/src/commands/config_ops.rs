use std::fs;

use seg_core::settings::{default_toml, parse_settings_toml, Settings, SettingsError};

pub fn settings_export() {
    print!("{}", default_toml());
}

/// One-line summary of what a settings file turns on.
pub fn summary(s: &Settings) -> String {
    let types: Vec<&str> = s
        .endpoints("{domain}")
        .configured()
        .into_iter()
        .map(|k| k.as_str())
        .collect();
    format!(
        "polling={} refresh={}s/{}s types=[{}] node={}",
        if s.remote.enabled { "on" } else { "off" },
        s.remote.refresh.delay_secs,
        s.remote.refresh.period_secs,
        types.join(","),
        s.cluster.local_node,
    )
}

pub fn check_settings(content: &str) -> Result<String, SettingsError> {
    parse_settings_toml(content).map(|s| summary(&s))
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    println!("OK: {}", die!(check_settings(&content), "Error: {}"));
}
