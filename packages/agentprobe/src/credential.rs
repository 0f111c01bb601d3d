//! Credential resolution.
//!
//! Credentials are resolved once per execution into an explicit
//! [`Credential`] and handed to the runtime, which applies it to the child
//! process environment only. Nothing here mutates the environment of the
//! current process.

use std::collections::HashMap;
use std::fmt;
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bon::Builder;
use derive_more::{Display, Error};
use directories::BaseDirs;

/// Environment variable holding a Claude Code OAuth token.
pub const OAUTH_TOKEN_VAR: &str = "CLAUDE_CODE_OAUTH_TOKEN";

/// Environment variable holding an Anthropic API key.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// A secret string that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} chars>)", self.0.len())
    }
}

/// The credential an agent runtime should run with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Credential {
    /// Let the runtime find credentials on its own.
    #[default]
    Ambient,

    OAuthToken(Secret),

    ApiKey(Secret),
}

impl Credential {
    /// Environment changes to apply to a child process: variables to set, and
    /// variables to remove so that the chosen credential takes precedence.
    pub fn child_env(&self) -> (Vec<(&'static str, &str)>, Vec<&'static str>) {
        match self {
            Credential::Ambient => (vec![], vec![]),
            Credential::OAuthToken(token) => {
                (vec![(OAUTH_TOKEN_VAR, token.expose())], vec![API_KEY_VAR])
            }
            Credential::ApiKey(key) => (vec![(API_KEY_VAR, key.expose())], vec![OAUTH_TOKEN_VAR]),
        }
    }

    /// Apply this credential to a child process command.
    pub fn apply(&self, command: &mut tokio::process::Command) {
        let (set, remove) = self.child_env();
        for name in remove {
            command.env_remove(name);
        }
        for (name, value) in set {
            command.env(name, value);
        }
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Origin {
    #[display("explicit token")]
    Explicit,

    #[display("token file {}", _0.display())]
    TokenFile(PathBuf),

    #[display("config file {}", _0.display())]
    ConfigFile(PathBuf),

    #[display("environment variable {_0}")]
    Environment(&'static str),

    #[display("ambient")]
    Ambient,
}

#[derive(Debug, Display, Error)]
pub enum CredentialError {
    #[display("credential file {} does not exist", path.display())]
    Missing { path: PathBuf },

    #[display("read credential file {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[display("credential file {} is empty", path.display())]
    Empty { path: PathBuf },
}

/// A snapshot of the credential-related environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot(HashMap<&'static str, String>);

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        [OAUTH_TOKEN_VAR, API_KEY_VAR]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name, value)))
            .collect()
    }

    fn get(&self, name: &'static str) -> Option<&str> {
        self.0.get(name).map(String::as_str).map(str::trim).filter(|value| !value.is_empty())
    }
}

impl FromIterator<(&'static str, String)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (&'static str, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The user-level config file: `~/.agentprobe/config`.
pub fn default_config_file() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".agentprobe").join("config"))
}

/// Credential sources, tried in order:
///
/// 1. An explicit OAuth token.
/// 2. A token file, which must exist and be non-empty.
/// 3. The user config file, skipped if missing or empty.
/// 4. The environment: OAuth token first, then API key.
///
/// If nothing resolves, the credential is [`Credential::Ambient`].
#[derive(Debug, Clone, Default, Builder)]
pub struct Sources {
    #[builder(into)]
    token: Option<String>,

    #[builder(into)]
    token_file: Option<PathBuf>,

    #[builder(into)]
    config_file: Option<PathBuf>,

    #[builder(default)]
    env: EnvSnapshot,
}

impl Sources {
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self) -> Result<(Credential, Origin), CredentialError> {
        if let Some(token) = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok((Credential::OAuthToken(Secret::new(token)), Origin::Explicit));
        }

        if let Some(path) = &self.token_file {
            return match read_token(path)? {
                Some(token) => Ok((Credential::OAuthToken(token), Origin::TokenFile(path.clone()))),
                None => Err(CredentialError::Empty { path: path.clone() }),
            };
        }

        if let Some(path) = &self.config_file {
            match read_token(path) {
                Ok(Some(token)) => {
                    return Ok((Credential::OAuthToken(token), Origin::ConfigFile(path.clone())));
                }
                Ok(None) => tracing::debug!(?path, "config file has no token"),
                Err(CredentialError::Missing { .. }) => tracing::debug!(?path, "no config file"),
                Err(error) => return Err(error),
            }
        }

        if let Some(token) = self.env.get(OAUTH_TOKEN_VAR) {
            return Ok((
                Credential::OAuthToken(Secret::new(token)),
                Origin::Environment(OAUTH_TOKEN_VAR),
            ));
        }
        if let Some(key) = self.env.get(API_KEY_VAR) {
            return Ok((Credential::ApiKey(Secret::new(key)), Origin::Environment(API_KEY_VAR)));
        }

        Ok((Credential::Ambient, Origin::Ambient))
    }
}

/// Read the first non-empty line of a file as a token.
fn read_token(path: &Path) -> Result<Option<Secret>, CredentialError> {
    let content = match read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CredentialError::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(CredentialError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };

    Ok(content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(Secret::new))
}
