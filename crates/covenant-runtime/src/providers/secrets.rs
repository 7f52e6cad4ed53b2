//! Credential handling for LLM providers.
//!
//! API keys are wrapped in [`SecretString`] as soon as they are read and
//! only exposed at the point they go into a request header.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` print `[REDACTED]`; the value is zeroed on drop.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load from an environment variable.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        Self::from_env_chain(&[env_var], name)
    }

    /// Load from the first set, non-empty variable in `env_vars`.
    pub fn from_env_chain(env_vars: &[&str], name: &'static str) -> Result<Self, ProviderError> {
        env_vars
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure the {} environment variable",
                    name,
                    env_vars.join(" or ")
                ))
            })
    }

    /// The raw value, for request headers only.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Test API key");

        let debug = format!("{:?}", cred);
        let display = format!("{}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert!(debug.contains("[REDACTED]"));
        assert!(display.contains("Test API key"));
        assert_eq!(cred.expose(), secret);
    }

    #[test]
    fn test_env_chain_takes_first_set() {
        std::env::set_var("COVENANT_TEST_KEY_SECOND", "second-key");
        let cred = ApiCredential::from_env_chain(
            &["COVENANT_TEST_KEY_UNSET_1", "COVENANT_TEST_KEY_SECOND"],
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.expose(), "second-key");
        assert_eq!(cred.source(), CredentialSource::Environment);
        std::env::remove_var("COVENANT_TEST_KEY_SECOND");
    }

    #[test]
    fn test_missing_env_names_variables() {
        let err = ApiCredential::from_env("COVENANT_TEST_KEY_UNSET_2", "Test key").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Test key"));
        assert!(message.contains("COVENANT_TEST_KEY_UNSET_2"));
    }
}
