// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the core pipelines and their external
// collaborators. The inference pipeline only needs the two
// inverse operations of the fitted preprocessing; the artifact
// layer only needs a byte-level object store.

use anyhow::Result;

// ─── Scaler ───────────────────────────────────────────────────────────────────
/// A fitted transform over the continuous block.
///
/// Implementations:
///   - StandardScaler → z-score per column
pub trait Scaler {
    /// Map scaled rows `[n, continuous_count]` back to original units.
    fn inverse_transform(&self, block: &[Vec<f32>]) -> Result<Vec<Vec<f64>>>;
}

// ─── CategoryEncoder ──────────────────────────────────────────────────────────
/// A fitted one-hot encoder over the categorical block.
///
/// Implementations:
///   - OneHotEncoder → sorted category set per column
pub trait CategoryEncoder {
    /// Map one-hot rows `[n, Σ widths]` back to one label per categorical column.
    fn inverse_transform(&self, one_hot: &[Vec<f32>]) -> Result<Vec<Vec<String>>>;

    /// One-hot width of each categorical column, in column order.
    fn group_widths(&self) -> Vec<usize>;
}

// ─── ObjectStore ──────────────────────────────────────────────────────────────
/// Byte-level storage for trained artifacts.
///
/// Implementations:
///   - LocalStore    → a directory on disk
///   - BucketFsStore → a remote bucket over HTTP
pub trait ObjectStore {
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<()>;

    fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Human-readable destination used in log lines and errors.
    fn describe(&self) -> String;
}
