//! AWS credential and region resolution.
//!
//! A named profile is read from the shared credentials file. Without a
//! profile, the standard environment variables win and the `AWS_PROFILE`
//! (or `default`) section of the shared file is the fallback.
//!
//! Secrets are wrapped in [`SecretString`] and never appear in `Debug` output.

use std::fmt;
use std::path::{Path, PathBuf};

use colloquy_types::embedding::EndpointError;
use secrecy::{ExposeSecret, SecretString};

use super::sigv4::Signer;

/// Long-term or session credentials used for SigV4 signing.
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

impl AwsCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            session_token: session_token.map(SecretString::from),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn has_session_token(&self) -> bool {
        self.session_token.is_some()
    }

    /// Borrow a signer scoped to `region` and `service`.
    pub fn signer<'a>(&'a self, region: &'a str, service: &'a str) -> Signer<'a> {
        Signer {
            access_key_id: &self.access_key_id,
            secret_access_key: self.secret_access_key.expose_secret(),
            session_token: self.session_token.as_ref().map(|t| t.expose_secret()),
            region,
            service,
        }
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Resolve credentials from the process environment and shared files.
pub async fn resolve_credentials(profile: Option<&str>) -> Result<AwsCredentials, EndpointError> {
    resolve_credentials_with(profile, |key| std::env::var(key).ok()).await
}

async fn resolve_credentials_with(
    profile: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AwsCredentials, EndpointError> {
    let var = |key: &str| env(key).filter(|v| !v.is_empty());

    if profile.is_none() {
        if let (Some(key_id), Some(secret)) =
            (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY"))
        {
            tracing::debug!("Using AWS credentials from environment");
            return Ok(AwsCredentials::new(key_id, secret, var("AWS_SESSION_TOKEN")));
        }
    }

    let profile_name = profile
        .map(str::to_string)
        .or_else(|| var("AWS_PROFILE"))
        .unwrap_or_else(|| "default".to_string());

    let path = var("AWS_SHARED_CREDENTIALS_FILE")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".aws").join("credentials")))
        .ok_or_else(|| {
            EndpointError::Credentials("cannot locate the shared credentials file".to_string())
        })?;

    let credentials = load_profile(&path, &profile_name).await?;
    tracing::debug!(profile = %profile_name, "Using AWS credentials from shared credentials file");
    Ok(credentials)
}

/// Read `profile` from the credentials file at `path`.
pub async fn load_profile(path: &Path, profile: &str) -> Result<AwsCredentials, EndpointError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        EndpointError::Credentials(format!("failed to read {}: {e}", path.display()))
    })?;

    parse_profile(&content, profile).ok_or_else(|| {
        EndpointError::Credentials(format!(
            "profile '{profile}' not found or incomplete in {}",
            path.display()
        ))
    })
}

/// Extract one profile from INI-formatted credentials.
///
/// Accepts both `[name]` and `[profile name]` section headers.
pub fn parse_profile(content: &str, profile: &str) -> Option<AwsCredentials> {
    let mut in_section = false;
    let mut key_id = None;
    let mut secret = None;
    let mut token = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let header = header.trim();
            let name = header.strip_prefix("profile ").map(str::trim).unwrap_or(header);
            in_section = name == profile;
            continue;
        }

        if !in_section {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match key.trim() {
                "aws_access_key_id" => key_id = Some(value),
                "aws_secret_access_key" => secret = Some(value),
                "aws_session_token" => token = Some(value),
                _ => {}
            }
        }
    }

    Some(AwsCredentials::new(key_id?, secret?, token))
}

/// Region from explicit config, else `AWS_REGION`, else `AWS_DEFAULT_REGION`.
pub fn resolve_region(explicit: Option<&str>) -> Result<String, EndpointError> {
    resolve_region_with(explicit, |key| std::env::var(key).ok())
}

fn resolve_region_with(
    explicit: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, EndpointError> {
    explicit
        .map(str::to_string)
        .or_else(|| env("AWS_REGION"))
        .or_else(|| env("AWS_DEFAULT_REGION"))
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            EndpointError::InvalidRequest(
                "no region configured; set embeddings.region or AWS_REGION".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CREDENTIALS: &str = r#"
# shared credentials
[default]
aws_access_key_id = AKIDDEFAULT
aws_secret_access_key = default-secret

[profile ml]
aws_access_key_id=AKIDML
aws_secret_access_key=ml-secret
aws_session_token=ml-token

[broken]
aws_access_key_id = AKIDBROKEN
"#;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_parse_profile_sections() {
        let default = parse_profile(CREDENTIALS, "default").unwrap();
        assert_eq!(default.access_key_id(), "AKIDDEFAULT");
        assert!(!default.has_session_token());

        let ml = parse_profile(CREDENTIALS, "ml").unwrap();
        assert_eq!(ml.access_key_id(), "AKIDML");
        assert!(ml.has_session_token());
        let signer = ml.signer("us-east-1", "sagemaker");
        assert_eq!(signer.secret_access_key, "ml-secret");
        assert_eq!(signer.session_token, Some("ml-token"));

        assert!(parse_profile(CREDENTIALS, "broken").is_none());
        assert!(parse_profile(CREDENTIALS, "missing").is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = AwsCredentials::new("AKID", "super-secret", Some("tok".to_string()));
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("tok\""));
    }

    #[tokio::test]
    async fn test_environment_credentials_win_without_profile() {
        let env = env_of(&[
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
            ("AWS_SESSION_TOKEN", "env-token"),
        ]);
        let creds = resolve_credentials_with(None, env).await.unwrap();
        assert_eq!(creds.access_key_id(), "AKIDENV");
        assert!(creds.has_session_token());
    }

    #[tokio::test]
    async fn test_named_profile_reads_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        tokio::fs::write(&path, CREDENTIALS).await.unwrap();
        let file = path.display().to_string();

        // An explicit profile ignores environment keys.
        let env = env_of(&[
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
            ("AWS_SHARED_CREDENTIALS_FILE", file.as_str()),
        ]);
        let creds = resolve_credentials_with(Some("ml"), env).await.unwrap();
        assert_eq!(creds.access_key_id(), "AKIDML");

        let env = env_of(&[("AWS_SHARED_CREDENTIALS_FILE", file.as_str())]);
        let creds = resolve_credentials_with(None, env).await.unwrap();
        assert_eq!(creds.access_key_id(), "AKIDDEFAULT");

        let env = env_of(&[("AWS_SHARED_CREDENTIALS_FILE", file.as_str()), ("AWS_PROFILE", "ml")]);
        let creds = resolve_credentials_with(None, env).await.unwrap();
        assert_eq!(creds.access_key_id(), "AKIDML");

        let env = env_of(&[("AWS_SHARED_CREDENTIALS_FILE", file.as_str())]);
        let err = resolve_credentials_with(Some("missing"), env).await.unwrap_err();
        assert!(matches!(err, EndpointError::Credentials(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_file_is_credentials_error() {
        let env = env_of(&[("AWS_SHARED_CREDENTIALS_FILE", "/nonexistent/colloquy/credentials")]);
        let err = resolve_credentials_with(None, env).await.unwrap_err();
        assert!(matches!(err, EndpointError::Credentials(_)));
    }

    #[test]
    fn test_region_resolution_order() {
        let env = env_of(&[("AWS_REGION", "eu-west-1"), ("AWS_DEFAULT_REGION", "us-east-2")]);
        assert_eq!(resolve_region_with(Some("us-west-2"), &env).unwrap(), "us-west-2");
        assert_eq!(resolve_region_with(None, &env).unwrap(), "eu-west-1");

        let env = env_of(&[("AWS_DEFAULT_REGION", "us-east-2")]);
        assert_eq!(resolve_region_with(None, env).unwrap(), "us-east-2");

        let err = resolve_region_with(None, env_of(&[])).unwrap_err();
        assert!(matches!(err, EndpointError::InvalidRequest(_)));
    }
}
