use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BackendCfg {
    /// Base URL of the inference backend, e.g. http://localhost:8000
    pub base_url: String,
    /// Name of the environment variable holding an optional bearer token.
    /// Absent for backends that are reachable without auth.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Substituted for an empty context text during request normalization.
    #[serde(default = "default_context")]
    pub default_context: String,
}

impl Default for BackendCfg {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key_env: None,
            default_context: default_context(),
        }
    }
}

fn default_context() -> String {
    "Image captured with a mobile camera.".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds (default 300000ms).
    /// Inference latency is backend-controlled and can be large, so the
    /// bound is generous but finite; exceeding it surfaces as `timeout`.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Timeout for the health-check probe in milliseconds (default 5000ms)
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            health_timeout_ms: default_health_timeout_ms(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    300_000
}
fn default_health_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryCfg {
    /// Total attempts including the first one (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before retry n is `base_delay_ms * n` (default 1000ms).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendCfg,
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub retry: RetryCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::TruthSyncError::from)?;
        let s =
            std::str::from_utf8(&bytes).map_err(|e| crate::error::TruthSyncError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::TruthSyncError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::TruthSyncError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::TruthSyncError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::TruthSyncError::Other(e.into()))
                })?,
        };
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_from_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("truthsync.json");
        let json = r#"{
          "backend": {"base_url":"http://10.0.0.5:8000","api_key_env":"TRUTHSYNC_API_KEY"},
          "http": {"connect_timeout_ms":2000,"request_timeout_ms":120000},
          "retry": {"max_attempts":5}
        }"#;
        fs::write(&file, json).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.backend.base_url, "http://10.0.0.5:8000");
        assert_eq!(cfg.backend.api_key_env.as_deref(), Some("TRUTHSYNC_API_KEY"));
        assert_eq!(cfg.http.connect_timeout_ms, 2_000);
        assert_eq!(cfg.http.request_timeout_ms, 120_000);
        // unset knobs fall back to defaults
        assert_eq!(cfg.http.health_timeout_ms, 5_000);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.base_delay_ms, 1_000);
    }

    #[test]
    fn load_from_toml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("truthsync.toml");
        let toml = r#"
[backend]
base_url = "http://localhost:8000"

[http]
request_timeout_ms = 600000

[retry]
max_attempts = 1
"#;
        fs::write(&file, toml).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.backend.base_url, "http://localhost:8000");
        assert_eq!(cfg.backend.api_key_env, None);
        assert_eq!(cfg.http.request_timeout_ms, 600_000);
        assert_eq!(cfg.retry.max_attempts, 1);
    }

    #[test]
    fn missing_file_returns_io_error() {
        let missing = std::path::PathBuf::from("/definitely/not/here/truthsync-missing.json");
        let err = Config::from_path(&missing).unwrap_err();
        match err {
            crate::error::TruthSyncError::Io(_) => {}
            other => panic!("expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_json_returns_other_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.json");
        let json = r#"{ "backend": { "base_url": 123 }"#; // missing closing }
        fs::write(&file, json).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        match err {
            crate::error::TruthSyncError::Other(_) => {}
            other => panic!("expected Other(json parse) error, got: {:?}", other),
        }
    }

    #[test]
    fn unknown_extension_falls_back_to_json_then_toml() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("truthsync.conf");
        fs::write(&json_path, r#"{"backend":{"base_url":"http://a"}}"#).unwrap();
        let cfg = Config::from_path(&json_path).unwrap();
        assert_eq!(cfg.backend.base_url, "http://a");

        let toml_path = dir.path().join("truthsync2.conf");
        fs::write(&toml_path, "[backend]\nbase_url = \"http://b\"\n").unwrap();
        let cfg2 = Config::from_path(&toml_path).unwrap();
        assert_eq!(cfg2.backend.base_url, "http://b");
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.backend.base_url, "http://localhost:8000");
        assert!(!cfg.backend.default_context.is_empty());
        assert_eq!(cfg.http.connect_timeout_ms, 5_000);
        assert_eq!(cfg.http.request_timeout_ms, 300_000);
        assert_eq!(cfg.retry.max_attempts, 3);
    }
}
