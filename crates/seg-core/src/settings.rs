//! Engine settings loaded from TOML.
//!
//! - `parse_settings_toml(toml)` parses and validates a full settings file
//! - `Settings::default()` is the embedded `default_settings.toml`
//! - the composition root owns the parsed value; nothing here is global

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::dict::Endpoints;
use crate::remote::HttpTimeouts;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub remote: RemoteSettings,
    #[serde(default)]
    pub cluster: ClusterSettings,
    #[serde(default)]
    pub baseline: BaselineSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    /// Poll endpoints in the background. Domains are loaded once on open
    /// either way.
    #[serde(alias = "enableRemoteDict")]
    pub enabled: bool,
    #[serde(default)]
    pub main_words: String,
    #[serde(default)]
    pub stop_words: String,
    #[serde(default)]
    pub quantifiers: String,
    /// Accept a fetched dictionary with no entries over a loaded one.
    #[serde(default)]
    pub allow_empty: bool,
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub oss: OssSettings,
    #[serde(default)]
    pub file: FileSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSettings {
    #[serde(alias = "delay")]
    pub delay_secs: u64,
    #[serde(alias = "period")]
    pub period_secs: u64,
}

impl RefreshSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            read_timeout_ms: 15_000,
            timeout_ms: 30_000,
        }
    }
}

impl HttpSettings {
    pub fn timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            read: Duration::from_millis(self.read_timeout_ms),
            overall: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OssSettings {
    /// Object-store host, e.g. `oss-cn-hangzhou-internal.aliyuncs.com`.
    pub endpoint: String,
    #[serde(alias = "credentialRoleIdentifier")]
    pub ram_role: String,
    pub metadata_service: String,
}

/// Serve dictionaries from a local directory instead of the object store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub root: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub local_node: String,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BaselineSettings {
    pub dir: Option<PathBuf>,
}

impl Settings {
    /// Per-domain endpoints expanded from the templates.
    pub fn endpoints(&self, domain: &str) -> Endpoints {
        Endpoints::from_templates(
            &self.remote.main_words,
            &self.remote.stop_words,
            &self.remote.quantifiers,
            domain,
        )
    }
}

impl Default for Settings {
    fn default() -> Self {
        // Checked by build.rs and `parse_default_toml`.
        parse_settings_toml(DEFAULT_SETTINGS_TOML)
            .unwrap_or_else(|e| panic!("embedded default settings are invalid: {e}"))
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! invalid {
        ($field:expr, $reason:expr) => {
            return Err(SettingsError::InvalidValue {
                field: $field.to_string(),
                reason: $reason.to_string(),
            })
        };
    }
    macro_rules! check_positive {
        ($section:ident . $group:ident . $field:ident) => {
            if s.$section.$group.$field == 0 {
                invalid!(
                    concat!(
                        stringify!($section),
                        ".",
                        stringify!($group),
                        ".",
                        stringify!($field)
                    ),
                    "must be positive"
                );
            }
        };
    }

    check_positive!(remote.refresh.period_secs);
    check_positive!(remote.http.connect_timeout_ms);
    check_positive!(remote.http.read_timeout_ms);
    check_positive!(remote.http.timeout_ms);

    let no_templates = [&s.remote.main_words, &s.remote.stop_words, &s.remote.quantifiers]
        .iter()
        .all(|t| t.trim().is_empty());
    if s.remote.enabled && no_templates {
        invalid!("remote", "enabled but no endpoint template is set");
    }
    if !no_templates && s.cluster.local_node.trim().is_empty() {
        invalid!("cluster.local_node", "required when an endpoint template is set");
    }

    let local = s.cluster.local_node.trim();
    if !s.cluster.nodes.is_empty()
        && !s
            .cluster
            .nodes
            .iter()
            .any(|n| n.trim().eq_ignore_ascii_case(local))
    {
        invalid!("cluster.nodes", format!("must include local node {local:?}"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENABLED: &str = r#"
[remote]
enableRemoteDict = true
main_words = "oss://bucket/{domain}/main.dic"

[remote.refresh]
delay = 0
period = 30

[remote.oss]
endpoint = "oss-cn-hangzhou-internal.aliyuncs.com"
credentialRoleIdentifier = "ik-role"

[cluster]
local_node = "Alpha"
nodes = ["alpha", "beta"]
"#;

    #[test]
    fn parse_default_toml() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        assert!(!s.remote.enabled);
        assert!(!s.remote.allow_empty);
        assert_eq!(s.remote.refresh.delay(), Duration::from_secs(10));
        assert_eq!(s.remote.refresh.period(), Duration::from_secs(60));
        assert_eq!(s.remote.http.timeouts(), HttpTimeouts::default());
        assert_eq!(s.cluster.local_node, "node-1");
        assert!(s.cluster.nodes.is_empty());
        assert!(s.baseline.dir.is_none());
    }

    #[test]
    fn disabled_polling_still_expands_endpoints() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        let e = s.endpoints("shop");
        assert_eq!(e.main_words.as_deref(), Some("oss://ik-dict/shop/main.dic"));
        assert_eq!(e.stop_words.as_deref(), Some("oss://ik-dict/shop/stopword.dic"));
        assert_eq!(e.quantifiers, None);
    }

    #[test]
    fn error_blank_local_node_with_templates() {
        let toml = ENABLED
            .replace("enableRemoteDict = true", "enableRemoteDict = false")
            .replace("local_node = \"Alpha\"", "local_node = \"\"")
            .replace("nodes = [\"alpha\", \"beta\"]", "");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("cluster.local_node"));
    }

    #[test]
    fn aliases_and_endpoints() {
        let s = parse_settings_toml(ENABLED).unwrap();
        assert!(s.remote.enabled);
        assert_eq!(s.remote.refresh.delay_secs, 0);
        assert_eq!(s.remote.refresh.period_secs, 30);
        assert_eq!(s.remote.oss.ram_role, "ik-role");
        assert_eq!(s.remote.http.read_timeout_ms, 15_000);
        let e = s.endpoints("shop");
        assert_eq!(e.main_words.as_deref(), Some("oss://bucket/shop/main.dic"));
        assert_eq!(e.stop_words, None);
    }

    #[test]
    fn error_zero_period() {
        let toml = ENABLED.replace("period = 30", "period = 0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
        assert!(err.to_string().contains("remote.refresh.period_secs"));
    }

    #[test]
    fn error_zero_timeout() {
        let toml = format!("{ENABLED}\n[remote.http]\nconnect_timeout_ms = 0\n");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("remote.http.connect_timeout_ms"));
    }

    #[test]
    fn error_enabled_without_templates() {
        let toml = ENABLED.replace("main_words = \"oss://bucket/{domain}/main.dic\"", "");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("no endpoint template"));
    }

    #[test]
    fn error_local_node_not_in_cluster() {
        let toml = ENABLED.replace("nodes = [\"alpha\", \"beta\"]", "nodes = [\"beta\"]");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("cluster.nodes"));
    }

    #[test]
    fn error_invalid_toml() {
        let err = parse_settings_toml("not valid toml {{{").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_missing_refresh() {
        let toml = "[remote]\nenabled = false\n";
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
