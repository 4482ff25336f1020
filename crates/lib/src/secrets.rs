//! Secret sources for downstream credentials and the platform URL.
//!
//! Secrets are looked up by name (e.g. `supabase-anon-key`). The default chain
//! checks the environment first (`SUPABASE_ANON_KEY`) and then an optional
//! directory of mounted secret files (`<dir>/supabase-anon-key`). Values are
//! trimmed and an empty value counts as absent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("reading secret {name} from {}: {source}", path.display())]
    Read {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Named secret lookup. `Ok(None)` means the source does not hold the secret.
pub trait SecretSource: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError>;
}

fn non_empty(value: &str) -> Option<String> {
    let t = value.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Environment variable name for a secret: upper-cased, `-` and `.` become `_`.
pub fn secret_env_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Reads secrets from environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        Ok(std::env::var(secret_env_name(name))
            .ok()
            .and_then(|v| non_empty(&v)))
    }
}

/// Reads secrets from files in a directory (one file per secret, named after it).
#[derive(Debug, Clone)]
pub struct DirSecrets {
    dir: PathBuf,
}

impl DirSecrets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SecretSource for DirSecrets {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| SecretError::Read {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        Ok(non_empty(&content))
    }
}

/// Fixed in-memory secrets.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        Ok(self.values.get(name).and_then(|v| non_empty(v)))
    }
}

/// Tries each source in order; the first one holding the secret wins.
/// A source that fails is logged and skipped.
#[derive(Default)]
pub struct SecretChain {
    sources: Vec<Box<dyn SecretSource>>,
}

impl SecretChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, source: impl SecretSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SecretSource for SecretChain {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        let mut last_err = None;
        for source in &self.sources {
            match source.get(name) {
                Ok(Some(v)) => return Ok(Some(v)),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("secret source failed for {}: {}", name, e);
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

/// Default chain: environment, then the mounted secrets directory when configured.
pub fn default_secret_source(directory: Option<&Path>) -> SecretChain {
    let chain = SecretChain::new().push(EnvSecrets);
    match directory {
        Some(dir) if !dir.as_os_str().is_empty() => chain.push(DirSecrets::new(dir)),
        _ => chain,
    }
}
