use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Vault settings, usually loaded from TOML.
///
/// ```toml
/// default_store = "primary"
/// cleanup_empty_dirs = true
///
/// [[stores]]
/// name = "primary"
/// root = "/var/lib/dms/primary"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Store that receives uploads. Uploads are held inline when unset.
    pub default_store: Option<String>,
    /// Remove directories left empty after a file is deleted.
    pub cleanup_empty_dirs: bool,
    /// Create store roots that do not exist yet.
    pub create_missing_roots: bool,
    /// File stores registered when the vault opens.
    pub stores: Vec<StoreConfig>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_store: None,
            cleanup_empty_dirs: true,
            create_missing_roots: true,
            stores: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    pub root: PathBuf,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            active: true,
        }
    }
}

impl VaultConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> VaultResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| VaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> VaultResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> VaultResult<String> {
        toml::to_string_pretty(self).map_err(|e| VaultError::Config(e.to_string()))
    }

    /// Add a store definition.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.stores.push(store);
        self
    }

    /// Route uploads to the named store.
    pub fn with_default_store(mut self, name: impl Into<String>) -> Self {
        self.default_store = Some(name.into());
        self
    }

    /// Check store names and roots, and that the default store is defined.
    pub fn validate(&self) -> VaultResult<()> {
        let mut names = HashSet::new();
        for store in &self.stores {
            if store.name.trim().is_empty() {
                return Err(VaultError::Config("store name cannot be empty".into()));
            }
            if store.root.as_os_str().is_empty() {
                return Err(VaultError::Config(format!(
                    "store '{}' has an empty root",
                    store.name
                )));
            }
            if !names.insert(store.name.as_str()) {
                return Err(VaultError::Config(format!(
                    "store '{}' is defined twice",
                    store.name
                )));
            }
        }
        if let Some(default) = &self.default_store {
            let Some(store) = self.stores.iter().find(|s| &s.name == default) else {
                return Err(VaultError::Config(format!(
                    "default store '{default}' is not defined"
                )));
            };
            if !store.active {
                return Err(VaultError::Config(format!(
                    "default store '{default}' is inactive"
                )));
            }
        }
        Ok(())
    }
}
