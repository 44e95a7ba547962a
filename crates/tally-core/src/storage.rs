//! Local document store
//!
//! Uploaded receipt files live under a root directory as
//! `{user}/{YYYYMMDD_HHMMSS}_{sha256[..12]}.{ext}`. Stored paths are
//! relative and forward-slash separated; anything that would resolve
//! outside the root is rejected.
//!
//! Downloads go through signed URLs:
//! `/files/{path}?expires={unix}&signature={hex}` where the signature is
//! HMAC-SHA256 over `"{path}:{expires}"`.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// URL prefix the server mounts the download route on
pub const FILES_ROUTE: &str = "/files";

/// A time-limited download link
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires: i64,
}

/// File storage for uploaded receipts
#[derive(Clone)]
pub struct DocumentStore {
    root: PathBuf,
    /// Keyed MAC, cloned for each signature
    signer: HmacSha256,
    ttl: Duration,
}

impl DocumentStore {
    /// Create a store; without a secret, one is generated for this process
    pub fn new(root: impl Into<PathBuf>, secret: Option<&str>, ttl: Duration) -> Result<Self> {
        let secret = match secret.filter(|s| !s.is_empty()) {
            Some(s) => s.as_bytes().to_vec(),
            None => {
                debug!("No signing secret configured, generating one for this process");
                let mut bytes = uuid::Uuid::new_v4().as_bytes().to_vec();
                bytes.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
                bytes
            }
        };

        let signer = HmacSha256::new_from_slice(&secret)
            .map_err(|e| Error::Storage(format!("Invalid signing secret: {}", e)))?;

        Ok(Self {
            root: root.into(),
            signer,
            ttl,
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(
            config.root.clone(),
            config.signing_secret.as_deref(),
            config.signed_url_ttl,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a document and return its store path
    ///
    /// The file is written to a temp file in the target directory and then
    /// renamed into place, so readers never see a partial file.
    pub fn save(
        &self,
        user_id: &str,
        bytes: &[u8],
        extension: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let hash = hex::encode(Sha256::digest(bytes));
        let relative = format!(
            "{}/{}_{}.{}",
            user_slug(user_id),
            now.format("%Y%m%d_%H%M%S"),
            &hash[..12],
            extension
        );

        let dest = self.resolve(&relative)?;
        let dir = dest
            .parent()
            .ok_or_else(|| Error::Storage(format!("Invalid store path: {}", relative)))?;
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| Error::Io(e.error))?;

        debug!(path = %relative, bytes = bytes.len(), "Stored document");
        Ok(relative)
    }

    /// Read a stored document
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        match fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("document {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored document; returns false if it was already gone
    pub fn delete(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path, "Stored document already missing");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Signed download URL valid for the configured TTL
    pub fn signed_url(&self, path: &str, now: DateTime<Utc>) -> SignedUrl {
        let expires = now.timestamp() + self.ttl.as_secs() as i64;
        let signature = hex::encode(self.mac(path, expires).finalize().into_bytes());
        SignedUrl {
            url: format!(
                "{}/{}?expires={}&signature={}",
                FILES_ROUTE, path, expires, signature
            ),
            expires,
        }
    }

    /// Check a download signature; constant time, rejects expired links
    pub fn verify(&self, path: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        self.mac(path, expires).verify_slice(&provided).is_ok()
    }

    fn mac(&self, path: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.signer.clone();
        mac.update(format!("{}:{}", path, expires).as_bytes());
        mac
    }

    /// Whether a store path lies in the user's directory
    pub fn owns(&self, user_id: &str, path: &str) -> bool {
        self.resolve(path).is_ok() && path.starts_with(&format!("{}/", user_slug(user_id)))
    }

    /// Map a store path to a file under the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && !path.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(Error::Storage(format!("Invalid store path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

/// Directory name for a user: lowercase, with anything but `[a-z0-9.-]`
/// replaced by `_`
fn user_slug(user_id: &str) -> String {
    let slug: String = user_id
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let slug = slug.trim_matches('.').to_string();
    if slug.is_empty() {
        "anonymous".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store(dir: &tempfile::TempDir) -> DocumentStore {
        DocumentStore::new(dir.path(), Some("test-secret"), Duration::from_secs(3600)).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_user_slug() {
        assert_eq!(user_slug("Jane.Doe@Example.com"), "jane.doe_example.com");
        assert_eq!(user_slug("../.."), "_");
        assert_eq!(user_slug("   "), "anonymous");
    }

    #[test]
    fn test_save_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 5).unwrap();

        let path = store.save("a@example.com", b"%PDF-1.7 receipt", "pdf", now).unwrap();
        let hash = hex::encode(Sha256::digest(b"%PDF-1.7 receipt"));
        assert_eq!(path, format!("a_example.com/20240301_093005_{}.pdf", &hash[..12]));

        assert_eq!(store.read(&path).unwrap(), b"%PDF-1.7 receipt");
        assert!(store.delete(&path).unwrap());
        assert!(!store.delete(&path).unwrap());
        assert!(matches!(store.read(&path), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        for path in ["../etc/passwd", "/etc/passwd", "a/../../b", "", "a\\..\\b", "./a"] {
            assert!(
                matches!(store.read(path), Err(Error::Storage(_))),
                "accepted {:?}",
                path
            );
        }
    }

    #[test]
    fn test_signed_url_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let path = "a_example.com/20240301_093005_abcdef123456.pdf";

        let signed = store.signed_url(path, at(1_000));
        assert_eq!(signed.expires, 4_600);
        assert!(signed
            .url
            .starts_with("/files/a_example.com/20240301_093005_abcdef123456.pdf?expires=4600&signature="));

        let signature = signed.url.rsplit_once("signature=").unwrap().1;
        assert!(store.verify(path, signed.expires, signature, at(2_000)));
        assert!(store.verify(path, signed.expires, signature, at(4_600)));
    }

    #[test]
    fn test_signature_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let path = "u/file.pdf";
        let signed = store.signed_url(path, at(1_000));
        let signature = signed.url.rsplit_once("signature=").unwrap().1;

        // Expired
        assert!(!store.verify(path, signed.expires, signature, at(4_601)));
        // Extended expiry
        assert!(!store.verify(path, signed.expires + 60, signature, at(2_000)));
        // Different file
        assert!(!store.verify("u/other.pdf", signed.expires, signature, at(2_000)));
        // Garbage
        assert!(!store.verify(path, signed.expires, "zz", at(2_000)));

        // Another secret
        let other =
            DocumentStore::new(dir.path(), Some("other"), Duration::from_secs(3600)).unwrap();
        assert!(!other.verify(path, signed.expires, signature, at(2_000)));
    }

    #[test]
    fn test_owns() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let path = store.save("Ann@Example.com", b"%PDF-", "pdf", at(0)).unwrap();

        assert!(store.owns("ann@example.com", &path));
        assert!(!store.owns("bob@example.com", &path));
        assert!(!store.owns("ann@example.com", "ann_example.com/../bob/x.pdf"));
    }
}
