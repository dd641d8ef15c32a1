//! Two-layer key-value credential storage.
//!
//! `TokenStore` keeps an in-memory layer in front of an optional JSON file.
//! Reads check memory first and fall back to the file layer; writes go to
//! both. Writing an empty value removes the key, which is how logout clears
//! the stored tokens.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, Result};
use crate::provider::CredentialProvider;

/// Key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Key holding the refresh token.
pub const REFRESH_KEY: &str = "refresh";
/// Key holding the token expiry as reported by the identity service.
pub const EXPIRES_KEY: &str = "expires";

/// Directory under the platform config dir used by [`TokenStore::open_default`].
const DEFAULT_DIR: &str = "balance-sdk";
const DEFAULT_FILE: &str = "credentials.json";

/// The token triple returned by the identity service on login.
///
/// Field names follow the identity service's JSON response, so a login
/// response body can be decoded straight into this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(rename = "Token", default)]
    pub token: Option<String>,
    #[serde(rename = "Refresh", default)]
    pub refresh: Option<String>,
    #[serde(rename = "Expires", default)]
    pub expires: Option<String>,
}

/// File-backed layer of the store.
#[derive(Debug)]
struct FileLayer {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl FileLayer {
    fn load(path: PathBuf) -> Result<Self> {
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| {
                CredentialError::Serialization {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(CredentialError::Io { path, source }),
        };

        tracing::debug!("Loaded {} credential entries from {}", values.len(), path.display());

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    fn flush(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| CredentialError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let encoded =
            serde_json::to_string_pretty(values).map_err(|source| CredentialError::Serialization {
                path: self.path.clone(),
                source,
            })?;

        // Sibling file + rename keeps the replacement atomic
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encoded).map_err(|source| CredentialError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| CredentialError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Thread-safe credential store with optional persistence.
///
/// # Example
///
/// ```
/// use credential_store::{CredentialProvider, TokenSet, TokenStore};
///
/// let store = TokenStore::in_memory();
/// assert!(!store.has_auth());
///
/// store.set_tokens(&TokenSet {
///     token: Some("tok123".to_string()),
///     refresh: Some("ref456".to_string()),
///     expires: None,
/// }).unwrap();
///
/// assert_eq!(store.token().as_deref(), Some("tok123"));
///
/// store.logout().unwrap();
/// assert!(!store.has_auth());
/// ```
#[derive(Debug)]
pub struct TokenStore {
    memory: RwLock<HashMap<String, String>>,
    file: Option<FileLayer>,
}

impl TokenStore {
    /// Create a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            file: None,
        }
    }

    /// Open a store persisted at `path`, loading any existing entries.
    ///
    /// A missing file is treated as an empty store and is created on the
    /// first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            memory: RwLock::new(HashMap::new()),
            file: Some(FileLayer::load(path.as_ref().to_path_buf())?),
        })
    }

    /// Open the store at the platform default location.
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// The platform default location of the credential file.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or(CredentialError::NoConfigDir)?;
        Ok(dir.join(DEFAULT_DIR).join(DEFAULT_FILE))
    }

    /// Path of the backing file, if this store is persisted.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    /// Look up a value, checking memory before the file layer.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.memory.read().get(key) {
            return Some(value.clone());
        }

        self.file
            .as_ref()
            .and_then(|file| file.values.read().get(key).cloned())
    }

    /// Store a value in both layers.
    ///
    /// `None` or an empty string removes the key instead.
    pub fn put(&self, key: &str, value: Option<&str>) -> Result<()> {
        let value = value.filter(|v| !v.is_empty());

        {
            let mut memory = self.memory.write();
            match value {
                Some(v) => {
                    memory.insert(key.to_string(), v.to_string());
                }
                None => {
                    memory.remove(key);
                }
            }
        }

        if let Some(file) = &self.file {
            let mut values = file.values.write();
            let changed = match value {
                Some(v) => values.insert(key.to_string(), v.to_string()).as_deref() != Some(v),
                None => values.remove(key).is_some(),
            };
            if changed {
                file.flush(&values)?;
            }
        }

        Ok(())
    }

    /// Store all three tokens from a login response.
    pub fn set_tokens(&self, tokens: &TokenSet) -> Result<()> {
        self.put(TOKEN_KEY, tokens.token.as_deref())?;
        self.put(REFRESH_KEY, tokens.refresh.as_deref())?;
        self.put(EXPIRES_KEY, tokens.expires.as_deref())?;
        tracing::debug!("Stored credentials (token present: {})", tokens.token.is_some());
        Ok(())
    }

    /// Read back the stored token triple.
    pub fn tokens(&self) -> TokenSet {
        TokenSet {
            token: self.get(TOKEN_KEY),
            refresh: self.get(REFRESH_KEY),
            expires: self.get(EXPIRES_KEY),
        }
    }

    /// Clear every stored token.
    pub fn logout(&self) -> Result<()> {
        self.set_tokens(&TokenSet::default())
    }

    /// Whether a bearer token is currently stored.
    ///
    /// Expiry is not checked; the server rejects stale tokens.
    pub fn has_auth(&self) -> bool {
        self.get(TOKEN_KEY).is_some()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl CredentialProvider for TokenStore {
    fn token(&self) -> Option<String> {
        self.get(TOKEN_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tokens(token: &str) -> TokenSet {
        TokenSet {
            token: Some(token.to_string()),
            refresh: Some(format!("{token}-refresh")),
            expires: Some("2030-01-01T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_in_memory_get_put() {
        let store = TokenStore::in_memory();
        assert_eq!(store.get("token"), None);

        store.put("token", Some("abc")).unwrap();
        assert_eq!(store.get("token").as_deref(), Some("abc"));
        assert!(store.path().is_none());
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    fn test_put_empty_value_removes(#[case] value: Option<&str>) {
        let store = TokenStore::in_memory();
        store.put("token", Some("abc")).unwrap();
        store.put("token", value).unwrap();
        assert_eq!(store.get("token"), None);
    }

    #[test]
    fn test_set_tokens_and_logout() {
        let store = TokenStore::in_memory();
        store.set_tokens(&tokens("tok123")).unwrap();

        assert!(store.has_auth());
        assert_eq!(store.token().as_deref(), Some("tok123"));
        assert_eq!(store.tokens(), tokens("tok123"));

        store.logout().unwrap();
        assert!(!store.has_auth());
        assert_eq!(store.tokens(), TokenSet::default());
    }

    #[test]
    fn test_token_set_decodes_login_response() {
        let body = r#"{"Token":"tok123","Refresh":"ref","Expires":"1700000000"}"#;
        let decoded: TokenSet = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.token.as_deref(), Some("tok123"));
        assert_eq!(decoded.refresh.as_deref(), Some("ref"));
        assert_eq!(decoded.expires.as_deref(), Some("1700000000"));

        let partial: TokenSet = serde_json::from_str(r#"{"Token":"t"}"#).unwrap();
        assert_eq!(partial.refresh, None);
    }

    #[test]
    fn test_persisted_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        {
            let store = TokenStore::open(&path).unwrap();
            store.set_tokens(&tokens("persisted")).unwrap();
        }

        let reopened = TokenStore::open(&path).unwrap();
        assert_eq!(reopened.token().as_deref(), Some("persisted"));
        assert_eq!(reopened.path(), Some(path.as_path()));

        reopened.logout().unwrap();
        let cleared = TokenStore::open(&path).unwrap();
        assert!(!cleared.has_auth());
    }

    #[test]
    fn test_missing_and_empty_files_are_empty_stores() {
        let dir = tempfile::tempdir().unwrap();

        let missing = TokenStore::open(dir.path().join("absent.json")).unwrap();
        assert!(!missing.has_auth());

        let empty_path = dir.path().join("empty.json");
        fs::write(&empty_path, "").unwrap();
        let empty = TokenStore::open(&empty_path).unwrap();
        assert!(!empty.has_auth());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        fs::write(&path, "{not json").unwrap();

        let result = TokenStore::open(&path);
        assert!(matches!(result, Err(CredentialError::Serialization { .. })));
    }

    #[test]
    fn test_memory_layer_shadows_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, r#"{"token":"from-file"}"#).unwrap();

        let store = TokenStore::open(&path).unwrap();
        assert_eq!(store.token().as_deref(), Some("from-file"));

        store.put(TOKEN_KEY, Some("fresh")).unwrap();
        assert_eq!(store.token().as_deref(), Some("fresh"));
    }
}
