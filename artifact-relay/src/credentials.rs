//! Resolves bucket and release credentials from the environment.
//!
//! A `.env` file in the working directory is loaded first when present.
//! Values are never logged; only whether they were found.

use std::env;

use artifact_relay_core::error::{RelayError, Result};
use artifact_relay_core::transport::BucketCredentials;

pub const BUCKET_ENDPOINT: &str = "BUCKET_ENDPOINT";
pub const BUCKET_NAME: &str = "BUCKET_NAME";
pub const BUCKET_ACCESS_KEY_ID: &str = "BUCKET_ACCESS_KEY_ID";
pub const BUCKET_SECRET_ACCESS_KEY: &str = "BUCKET_SECRET_ACCESS_KEY";
pub const GH_TOKEN: &str = "GH_TOKEN";

/// Reads a required, non-empty variable.
pub fn resolve_secret(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => {
            tracing::error!(name, "Credential is set but empty");
            Err(RelayError::CredentialResolution {
                name: name.to_string(),
                details: "value is empty".to_string(),
            })
        }
        Err(e) => {
            tracing::error!(name, error = ?e, "Credential missing in environment");
            Err(RelayError::CredentialResolution {
                name: name.to_string(),
                details: e.to_string(),
            })
        }
    }
}

/// Bucket name plus the credentials the S3 transport needs.
#[derive(Debug, Clone)]
pub struct BucketTarget {
    pub bucket: String,
    pub credentials: BucketCredentials,
}

impl BucketTarget {
    pub fn new_from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let target = BucketTarget {
            bucket: resolve_secret(BUCKET_NAME)?,
            credentials: BucketCredentials {
                endpoint_url: resolve_secret(BUCKET_ENDPOINT)?,
                access_key_id: resolve_secret(BUCKET_ACCESS_KEY_ID)?,
                secret_access_key: resolve_secret(BUCKET_SECRET_ACCESS_KEY)?,
            },
        };
        tracing::info!(
            endpoint = %target.credentials.endpoint_url,
            "Resolved bucket credentials from environment"
        );
        Ok(target)
    }
}

pub fn github_token_from_env() -> Result<String> {
    dotenvy::dotenv().ok();
    let token = resolve_secret(GH_TOKEN)?;
    tracing::info!("Resolved GitHub token from environment");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL: [&str; 4] = [
        BUCKET_ENDPOINT,
        BUCKET_NAME,
        BUCKET_ACCESS_KEY_ID,
        BUCKET_SECRET_ACCESS_KEY,
    ];

    #[test]
    #[serial]
    fn bucket_target_reads_all_four_variables() {
        let values = ["https://r2.example.com", "artifacts", "AKIA", "secret"];
        for (name, value) in ALL.iter().zip(values) {
            env::set_var(name, value);
        }
        let target = BucketTarget::new_from_env().expect("all variables are set");
        assert_eq!(target.bucket, "artifacts");
        assert_eq!(target.credentials.endpoint_url, "https://r2.example.com");
        assert_eq!(target.credentials.secret_access_key, "secret");
        for name in ALL {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn empty_secret_is_a_resolution_failure() {
        env::set_var(GH_TOKEN, "  ");
        let err = github_token_from_env().unwrap_err();
        assert!(matches!(
            err,
            RelayError::CredentialResolution { ref name, .. } if name == GH_TOKEN
        ));
        env::remove_var(GH_TOKEN);
    }

    #[test]
    #[serial]
    fn missing_secret_names_the_variable() {
        env::remove_var(BUCKET_NAME);
        let err = resolve_secret(BUCKET_NAME).unwrap_err();
        assert!(err.to_string().contains(BUCKET_NAME));
    }
}
