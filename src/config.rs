use serde::{Deserialize, Serialize};

use crate::taxonomy::{ClassEntry, DiseaseTaxonomy};

/// Pixel-value normalization applied after resize.
///
/// Must match the scheme used when the model artifact was produced. A
/// mismatch does not fail loudly anywhere, it just degrades accuracy, so
/// this is a deployment-file constant rather than anything negotiated per
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationScheme {
    /// x / 255, range [0, 1].
    UnitScale,
    /// x / 127.5 - 1, range [-1, 1].
    SignedUnitScale,
    /// [0, 1] then per-channel ImageNet mean/std.
    ImageNetMeanStd,
    /// Unscaled byte values.
    RawBytes,
}

/// How the model is brought up and what happens when it cannot be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Load at startup; a failure is logged and retried on first request.
    Immediate,
    /// Defer loading until the first prediction request.
    Lazy,
    /// Lazy, with bounded backoff retries across requests.
    Retrying,
    /// Retrying, and once retries are exhausted serve demo-mode responses
    /// instead of failing every request.
    Degraded,
}

impl LoadPolicy {
    pub fn preload_at_startup(&self) -> bool {
        matches!(self, LoadPolicy::Immediate)
    }

    pub fn demo_fallback(&self) -> bool {
        matches!(self, LoadPolicy::Degraded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// Retry discipline for model loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_backoff_kind")]
    pub backoff: BackoffKind,
}

impl RetryConfig {
    /// Sleep before retry number `attempt` (1-based; no sleep before the
    /// first attempt).
    pub fn delay_before(&self, attempt: u32) -> std::time::Duration {
        let ms = match self.backoff {
            BackoffKind::Fixed => self.backoff_ms,
            BackoffKind::Exponential => {
                self.backoff_ms.saturating_mul(1u64 << (attempt - 1).min(16))
            }
        };
        std::time::Duration::from_millis(ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            backoff: default_backoff_kind(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_backoff_kind() -> BackoffKind {
    BackoffKind::Fixed
}

fn default_model_path() -> String {
    "models/rice_disease.pt".to_string()
}

fn default_architecture() -> String {
    "Rice Disease Detection CNN".to_string()
}

fn default_input_size() -> (u32, u32) {
    (224, 224)
}

fn default_scheme() -> NormalizationScheme {
    NormalizationScheme::UnitScale
}

fn default_min_artifact_bytes() -> u64 {
    1_000_000
}

fn default_load_policy() -> LoadPolicy {
    LoadPolicy::Degraded
}

/// Deployment-time service configuration, read once at startup from a YAML
/// file (path in `MODEL_CONFIG`, default `config/model.yaml`). Nothing in
/// here is runtime-negotiable per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_architecture")]
    pub architecture: String,
    /// (height, width) the model expects.
    #[serde(default = "default_input_size")]
    pub input_size: (u32, u32),
    #[serde(default = "default_scheme")]
    pub normalization: NormalizationScheme,
    /// Artifacts smaller than this are rejected without deserializing.
    #[serde(default = "default_min_artifact_bytes")]
    pub min_artifact_bytes: u64,
    #[serde(default = "default_load_policy")]
    pub load_policy: LoadPolicy,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Taxonomy override; omitted means the built-in nine-class rice list.
    #[serde(default)]
    pub classes: Option<Vec<ClassEntry>>,
}

impl AppConfig {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("MODEL_CONFIG").unwrap_or_else(|_| {
            match std::env::var("CARGO_MANIFEST_DIR") {
                Ok(manifest_dir) => format!("{}/config/model.yaml", manifest_dir),
                Err(_) => "config/model.yaml".to_string(),
            }
        });
        let config_str = std::fs::read_to_string(&config_path)?;
        let mut config: AppConfig = serde_yaml::from_str(&config_str)?;
        if let Ok(model_path) = std::env::var("MODEL_PATH") {
            config.model_path = model_path;
        }
        Ok(config)
    }

    pub fn taxonomy(&self) -> DiseaseTaxonomy {
        match &self.classes {
            Some(classes) => DiseaseTaxonomy::new(classes.clone()),
            None => DiseaseTaxonomy::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            architecture: default_architecture(),
            input_size: default_input_size(),
            normalization: default_scheme(),
            min_artifact_bytes: default_min_artifact_bytes(),
            load_policy: default_load_policy(),
            retry: RetryConfig::default(),
            classes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let config: AppConfig = serde_yaml::from_str("model_path: /srv/model.pt\n").unwrap();
        assert_eq!(config.model_path, "/srv/model.pt");
        assert_eq!(config.input_size, (224, 224));
        assert_eq!(config.normalization, NormalizationScheme::UnitScale);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.classes.is_none());
    }

    #[test]
    fn scheme_and_policy_parse_from_snake_case() {
        let yaml = "normalization: signed_unit_scale\nload_policy: lazy\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.normalization, NormalizationScheme::SignedUnitScale);
        assert_eq!(config.load_policy, LoadPolicy::Lazy);
        assert!(!config.load_policy.demo_fallback());
    }

    #[test]
    fn exponential_backoff_doubles_per_attempt() {
        let retry = RetryConfig {
            max_attempts: 4,
            backoff_ms: 100,
            backoff: BackoffKind::Exponential,
        };
        assert_eq!(retry.delay_before(1).as_millis(), 100);
        assert_eq!(retry.delay_before(2).as_millis(), 200);
        assert_eq!(retry.delay_before(3).as_millis(), 400);
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_before(1), retry.delay_before(3));
    }
}
