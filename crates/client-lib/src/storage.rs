// ============================
// crates/client-lib/src/storage.rs
// ============================
/** Durable client-side storage.
Holds the credential pair and the persisted delivery address under stable
string keys, so a cold start can pick up where the last run left off. */
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokio::fs as tokio_fs;

use crate::auth::tokens::TokenPair;
use crate::error::AppError;
use quickbite_common::SelectedAddress;

/// Storage key for the bearer token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key for the rotation token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key for the persisted delivery address
pub const SELECTED_ADDRESS_KEY: &str = "selectedAddress";

/// File holding the generated cipher key
const KEY_FILE: &str = "session.key";

/// Durable key-value storage used by the session manager.
///
/// The token pair is stored and removed as a unit; implementations must
/// never surface one token without the other.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted token pair. A half-present pair is treated as
    /// absent and cleaned up.
    async fn load_tokens(&self) -> Result<Option<TokenPair>, AppError>;
    /// Persist both tokens durably.
    async fn store_tokens(&self, tokens: &TokenPair) -> Result<(), AppError>;
    /// Remove both tokens.
    async fn clear_tokens(&self) -> Result<(), AppError>;
    /// Load the persisted delivery address, if any.
    async fn load_selected_address(&self) -> Result<Option<SelectedAddress>, AppError>;
    /// Persist the delivery address.
    async fn store_selected_address(&self, address: &SelectedAddress) -> Result<(), AppError>;
    /// Remove the persisted delivery address.
    async fn clear_selected_address(&self) -> Result<(), AppError>;
}

/// File-backed store with token values encrypted at rest.
pub struct EncryptedFileStore {
    root: PathBuf,
    cipher_key: [u8; 32],
}

impl EncryptedFileStore {
    /** Open a store rooted at `root`, creating the directory if needed.
    Token values are encrypted with AES-256-GCM under a key generated on
    first run and kept in `session.key` next to the data files. */
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        // Load or generate encryption key
        let key_path = root.join(KEY_FILE);
        let cipher_key = if key_path.exists() {
            let key_data = fs::read(&key_path)?;
            if key_data.len() != 32 {
                return Err(AppError::Storage(
                    "invalid cipher key length".to_string(),
                ));
            }
            let mut key = [0u8; 32];
            key.copy_from_slice(&key_data);
            key
        } else {
            let mut key = [0u8; 32];
            OsRng.fill_bytes(&mut key);
            fs::write(&key_path, key)?;
            key
        };

        Ok(Self { root, cipher_key })
    }

    fn token_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.dat"))
    }

    fn address_path(&self) -> PathBuf {
        self.root.join(format!("{SELECTED_ADDRESS_KEY}.json"))
    }

    /// Encrypt a value as nonce || ciphertext, base64-coded so the files
    /// stay printable
    fn seal(&self, plaintext: &[u8]) -> Result<String, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.cipher_key)
            .map_err(|e| AppError::Storage(format!("cipher init failed: {e}")))?;
        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| AppError::Storage("encryption failed".to_string()))?;

        let mut combined = Vec::with_capacity(nonce_bytes.len() + sealed.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&sealed);
        Ok(BASE64.encode(combined))
    }

    fn unseal(&self, encoded: &str) -> Result<Vec<u8>, AppError> {
        let combined = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Storage(format!("corrupt stored value: {e}")))?;
        if combined.len() < 12 {
            // Nonce is 12 bytes
            return Err(AppError::Storage("stored value too short".to_string()));
        }
        let (nonce_bytes, sealed) = combined.split_at(12);
        let cipher = Aes256Gcm::new_from_slice(&self.cipher_key)
            .map_err(|e| AppError::Storage(format!("cipher init failed: {e}")))?;
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| AppError::Storage("decryption failed".to_string()))
    }

    async fn read_value(&self, key: &str) -> Result<Option<String>, AppError> {
        match tokio_fs::read_to_string(self.token_path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_value(&self, path: PathBuf) -> Result<(), AppError> {
        match tokio_fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialStore for EncryptedFileStore {
    async fn load_tokens(&self) -> Result<Option<TokenPair>, AppError> {
        let access = self.read_value(ACCESS_TOKEN_KEY).await?;
        let refresh = self.read_value(REFRESH_TOKEN_KEY).await?;

        let (access, refresh) = match (access, refresh) {
            (Some(a), Some(r)) => (a, r),
            (None, None) => return Ok(None),
            _ => {
                // Half a pair is useless; drop the leftover
                tracing::warn!("found unpaired credential on disk, clearing");
                self.clear_tokens().await?;
                return Ok(None);
            },
        };

        match (self.unseal(&access), self.unseal(&refresh)) {
            (Ok(a), Ok(r)) => match (String::from_utf8(a), String::from_utf8(r)) {
                (Ok(access), Ok(refresh)) => Ok(Some(TokenPair::new(access, refresh))),
                _ => {
                    tracing::warn!("stored credentials are not valid UTF-8, clearing");
                    self.clear_tokens().await?;
                    Ok(None)
                },
            },
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "stored credentials unreadable, clearing");
                self.clear_tokens().await?;
                Ok(None)
            },
        }
    }

    async fn store_tokens(&self, tokens: &TokenPair) -> Result<(), AppError> {
        let access = self.seal(tokens.access.as_bytes())?;
        let refresh = self.seal(tokens.refresh.as_bytes())?;
        tokio_fs::write(self.token_path(ACCESS_TOKEN_KEY), access).await?;
        tokio_fs::write(self.token_path(REFRESH_TOKEN_KEY), refresh).await?;
        Ok(())
    }

    async fn clear_tokens(&self) -> Result<(), AppError> {
        self.remove_value(self.token_path(ACCESS_TOKEN_KEY)).await?;
        self.remove_value(self.token_path(REFRESH_TOKEN_KEY)).await?;
        Ok(())
    }

    async fn load_selected_address(&self) -> Result<Option<SelectedAddress>, AppError> {
        match tokio_fs::read(self.address_path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store_selected_address(&self, address: &SelectedAddress) -> Result<(), AppError> {
        let json = serde_json::to_vec(address)?;
        tokio_fs::write(self.address_path(), json).await?;
        Ok(())
    }

    async fn clear_selected_address(&self) -> Result<(), AppError> {
        self.remove_value(self.address_path()).await
    }
}

/// Generate a random nonce for AES-GCM
fn generate_nonce() -> [u8; 12] {
    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
