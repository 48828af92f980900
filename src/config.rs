//! Connection settings for the Vertex AI chat service.
//!
//! Every option can come from the command line or the environment; `.env` is
//! loaded by `main` before parsing so values there are picked up too.

use clap::Args;
use reqwest::Url;
use std::time::Duration;

use crate::constants::{DEFAULT_LOCATION, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::error::ConfigError;

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Google Cloud project that hosts the Gemini model (required).
    #[arg(long, global = true, env = "PROJECT_ID")]
    pub project_id: Option<String>,

    /// Gemini model used for new chat sessions.
    #[arg(long, global = true, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Vertex AI region.
    #[arg(long, global = true, env = "VERTEX_LOCATION", default_value = DEFAULT_LOCATION)]
    pub location: String,

    /// Override the Vertex AI base URL (defaults to the regional endpoint).
    #[arg(long, global = true, env = "VERTEX_API_ENDPOINT")]
    pub api_endpoint: Option<String>,

    /// OAuth bearer token sent with every request.
    #[arg(long, global = true, env = "VERTEX_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "VERTEX_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

/// Validated settings. Building one is the fatal-startup checkpoint.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_id: String,
    pub model: String,
    pub location: String,
    pub api_endpoint: Url,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl Settings {
    pub fn from_args(args: &ConnectionArgs) -> Result<Self, ConfigError> {
        let project_id = args
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingProjectId)?
            .to_string();

        let endpoint = args
            .api_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", args.location));
        let api_endpoint = Url::parse(endpoint.trim_end_matches('/')).map_err(|e| {
            ConfigError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(api_endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                endpoint,
                reason: "scheme must be http or https".to_string(),
            });
        }

        Ok(Self {
            project_id,
            model: args.model.clone(),
            location: args.location.clone(),
            api_endpoint,
            access_token: args.access_token.clone().filter(|t| !t.trim().is_empty()),
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }

    /// Full URL of a model's generateContent method.
    pub fn generate_content_url(&self, model_id: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.api_endpoint.as_str().trim_end_matches('/'),
            self.project_id,
            self.location,
            model_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(project: Option<&str>) -> ConnectionArgs {
        ConnectionArgs {
            project_id: project.map(str::to_string),
            model: DEFAULT_MODEL.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            api_endpoint: None,
            access_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    #[test]
    fn test_missing_project_is_fatal() {
        assert!(matches!(
            Settings::from_args(&args(None)),
            Err(ConfigError::MissingProjectId)
        ));
        assert!(matches!(
            Settings::from_args(&args(Some("   "))),
            Err(ConfigError::MissingProjectId)
        ));
    }

    #[test]
    fn test_default_regional_endpoint() {
        let settings = Settings::from_args(&args(Some("fleet-support"))).unwrap();
        assert_eq!(settings.project_id, "fleet-support");
        assert_eq!(
            settings.generate_content_url(&settings.model),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/fleet-support/locations/us-central1/publishers/google/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(settings.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_endpoint_override_trailing_slash() {
        let mut a = args(Some("p"));
        a.api_endpoint = Some("http://127.0.0.1:8080/".to_string());
        let settings = Settings::from_args(&a).unwrap();
        assert!(settings
            .generate_content_url("gemini-2.0-flash")
            .starts_with("http://127.0.0.1:8080/v1/projects/p/"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut a = args(Some("p"));
        a.api_endpoint = Some("not a url".to_string());
        assert!(matches!(
            Settings::from_args(&a),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        a.api_endpoint = Some("ftp://example.com".to_string());
        assert!(matches!(
            Settings::from_args(&a),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_blank_token_ignored() {
        let mut a = args(Some("p"));
        a.access_token = Some("  ".to_string());
        assert!(Settings::from_args(&a).unwrap().access_token.is_none());
    }
}
