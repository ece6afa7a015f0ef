// ============================================================
// Layer 6 — Object Stores
// ============================================================
// Byte-level backends behind the ObjectStore trait:
//
//   LocalStore    — files under a root directory
//   BucketFsStore — HTTP PUT/GET against a BucketFS service
//                   at <url>/<bucket>/<path>, basic auth
//
// Neither backend knows what the bytes are; naming and
// serialisation live in the artifact module.

use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::domain::traits::ObjectStore;

/// Where trained artifacts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreLocation {
    Local,
    #[value(name = "bucketfs")]
    #[serde(rename = "bucketfs")]
    BucketFs,
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::Local    => write!(f, "local"),
            StoreLocation::BucketFs => write!(f, "BucketFS"),
        }
    }
}

// ─── LocalStore ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl ObjectStore for LocalStore {
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }
        fs::write(&target, bytes)
            .with_context(|| format!("Cannot write '{}'", target.display()))?;
        tracing::debug!("Wrote {} bytes to '{}'", bytes.len(), target.display());
        Ok(())
    }

    fn download(&self, path: &str) -> Result<Vec<u8>> {
        let source = self.resolve(path);
        fs::read(&source).with_context(|| format!("Cannot read '{}'", source.display()))
    }

    fn describe(&self) -> String {
        format!("local ({})", self.root.display())
    }
}

// ─── BucketFsStore ────────────────────────────────────────────────────────────
/// Connection settings for a BucketFS bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketFsSettings {
    /// Service root, e.g. `http://localhost:6583`
    pub url:      String,
    pub bucket:   String,
    pub user:     String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct BucketFsStore {
    settings: BucketFsSettings,
    timeout:  Duration,
}

impl BucketFsStore {
    pub fn new(settings: BucketFsSettings) -> Result<Self> {
        if settings.url.trim().is_empty() {
            bail!("BucketFS url is empty");
        }
        if settings.bucket.trim().is_empty() {
            bail!("BucketFS bucket is empty");
        }
        Ok(Self { settings, timeout: Duration::from_secs(120) })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.settings.url.trim_end_matches('/'),
            self.settings.bucket.trim_matches('/'),
            path.trim_start_matches('/'),
        )
    }

    fn authorization(&self) -> String {
        let credentials = format!("{}:{}", self.settings.user, self.settings.password);
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(credentials))
    }
}

impl ObjectStore for BucketFsStore {
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let url = self.object_url(path);
        ureq::put(&url)
            .set("Authorization", &self.authorization())
            .set("Content-Type", "application/octet-stream")
            .timeout(self.timeout)
            .send_bytes(bytes)
            .with_context(|| format!("PUT {url} failed"))?;
        tracing::debug!("Uploaded {} bytes to {}", bytes.len(), url);
        Ok(())
    }

    fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.object_url(path);
        let response = ureq::get(&url)
            .set("Authorization", &self.authorization())
            .timeout(self.timeout)
            .call()
            .with_context(|| format!("GET {url} failed"))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading body of {url} failed"))?;
        Ok(bytes)
    }

    fn describe(&self) -> String {
        format!("BucketFS ({}/{})", self.settings.url.trim_end_matches('/'), self.settings.bucket)
    }
}

/// Build the store for `location`. `root` is the local artifact
/// directory; `remote` must be set for BucketFS.
pub fn open_store(
    location: StoreLocation,
    root:     &Path,
    remote:   Option<BucketFsSettings>,
) -> Result<Box<dyn ObjectStore>> {
    match location {
        StoreLocation::Local => Ok(Box::new(LocalStore::new(root))),
        StoreLocation::BucketFs => {
            let settings = remote.context(
                "BucketFS selected but no connection settings given \
                 (set BUCKETFS_URL, BUCKETFS_BUCKET, BUCKETFS_USER, BUCKETFS_PASSWORD)",
            )?;
            Ok(Box::new(BucketFsStore::new(settings)?))
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BucketFsSettings {
        BucketFsSettings {
            url:      "http://localhost:6583/".into(),
            bucket:   "default".into(),
            user:     "w".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn test_local_round_trip_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.upload("autoencoder/model.pth", b"weights").unwrap();
        assert_eq!(store.download("autoencoder/model.pth").unwrap(), b"weights");
        assert!(dir.path().join("autoencoder").is_dir());
    }

    #[test]
    fn test_local_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalStore::new(dir.path()).download("nope.pth").is_err());
    }

    #[test]
    fn test_bucketfs_url_layout() {
        let store = BucketFsStore::new(settings()).unwrap();
        assert_eq!(
            store.object_url("autoencoder/autoencoder_x.pth"),
            "http://localhost:6583/default/autoencoder/autoencoder_x.pth"
        );
    }

    #[test]
    fn test_bucketfs_basic_auth_header() {
        let store = BucketFsStore::new(settings()).unwrap();
        // base64("w:secret")
        assert_eq!(store.authorization(), "Basic dzpzZWNyZXQ=");
    }

    #[test]
    fn test_bucketfs_requires_url_and_bucket() {
        let mut s = settings();
        s.url = " ".into();
        assert!(BucketFsStore::new(s).is_err());
        let mut s = settings();
        s.bucket = String::new();
        assert!(BucketFsStore::new(s).is_err());
    }

    #[test]
    fn test_open_store_needs_remote_settings() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_store(StoreLocation::BucketFs, dir.path(), None).is_err());
        let local = open_store(StoreLocation::Local, dir.path(), None).unwrap();
        assert!(local.describe().starts_with("local"));
    }
}
