// ============================================================
// Layer 6 — Checkpoint Manager and Model Artifacts
// ============================================================
// Two kinds of persisted state:
//
//   1. The trained weights ("artifact"), serialised with Burn's
//      NamedMpkBytesRecorder and pushed through an ObjectStore,
//      so the same bytes can live on local disk or in BucketFS:
//
//        autoencoder/autoencoder_<layers>_<wlc>.pth   (unnamed)
//        autoencoder/autoencoder_<name>.pth           (named)
//
//   2. The JSON side files in the checkpoint directory that let
//      the clean/anonymize passes rebuild the exact network:
//
//        checkpoints/
//          train_config.json   ← run configuration
//          network.json        ← resolved StackedNetConfig
//          preprocessor.json   ← fitted scaler + encoder
//          metrics.csv         ← written by MetricsLogger
//
// Every artifact failure is wrapped into ArtifactError, which
// names the artifact and destination and keeps the cause.

use anyhow::{ensure, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::application::train_use_case::TrainConfig;
use crate::data::preprocessor::TabularPreprocessor;
use crate::domain::traits::ObjectStore;
use crate::ml::loss::LossWeights;
use crate::ml::model::{StackedNet, StackedNetConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Folder inside every store that holds model artifacts.
pub const ARTIFACT_PREFIX: &str = "autoencoder";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed saving {name} to {destination}")]
    Save {
        name:        String,
        destination: String,
        #[source]
        source:      BoxError,
    },

    #[error("Failed loading {name} from {destination}")]
    Load {
        name:        String,
        destination: String,
        #[source]
        source:      BoxError,
    },
}

/// `autoencoder_<name>.pth`, or `autoencoder_<l0_l1_..>_<(ce, mse)>.pth`
/// when no name is given.
pub fn artifact_name(layers: &[usize], wlc: LossWeights, name: Option<&str>) -> String {
    match name {
        Some(n) => format!("autoencoder_{n}.pth"),
        None => {
            let joined = layers.iter().map(usize::to_string).collect::<Vec<_>>().join("_");
            format!("autoencoder_{joined}_{wlc}.pth")
        }
    }
}

fn store_path(file: &str) -> String {
    format!("{ARTIFACT_PREFIX}/{file}")
}

/// Serialise `model` and upload it as `file`.
pub fn save_model<B: Backend>(
    model: &StackedNet<B>,
    store: &dyn ObjectStore,
    file:  &str,
) -> Result<(), ArtifactError> {
    let fail = |source: BoxError| ArtifactError::Save {
        name:        file.to_string(),
        destination: store.describe(),
        source,
    };

    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
    let bytes = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
        .map_err(|e| fail(format!("{e:?}").into()))?;
    store.upload(&store_path(file), &bytes).map_err(|e| fail(e.into()))?;

    tracing::info!("Saved weights to {}/{} on {}", ARTIFACT_PREFIX, file, store.describe());
    Ok(())
}

/// Download `file` and load it into `model`, whose architecture must
/// match the one that was saved.
pub fn load_model<B: Backend>(
    model:  StackedNet<B>,
    store:  &dyn ObjectStore,
    file:   &str,
    device: &B::Device,
) -> Result<StackedNet<B>, ArtifactError> {
    let fail = |source: BoxError| ArtifactError::Load {
        name:        file.to_string(),
        destination: store.describe(),
        source,
    };

    let bytes = store.download(&store_path(file)).map_err(|e| fail(e.into()))?;
    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
    let record = Recorder::<B>::load(&recorder, bytes, device)
        .map_err(|e| fail(format!("{e:?}").into()))?;

    tracing::info!("Loaded weights from {}/{} on {}", ARTIFACT_PREFIX, file, store.describe());
    Ok(model.load_record(record))
}

// ─── CheckpointManager ────────────────────────────────────────────────────────
/// JSON side files of one training run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Opens an existing run directory without creating anything.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure!(dir.is_dir(), "Checkpoint dir '{}' does not exist", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json("train_config.json", cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        self.read_json("train_config.json")
    }

    pub fn save_network(&self, cfg: &StackedNetConfig) -> Result<()> {
        self.write_json("network.json", cfg)
    }

    pub fn load_network(&self) -> Result<StackedNetConfig> {
        self.read_json("network.json")
    }

    pub fn save_preprocessor(&self, pre: &TabularPreprocessor) -> Result<()> {
        self.write_json("preprocessor.json", pre)
    }

    pub fn load_preprocessor(&self) -> Result<TabularPreprocessor> {
        self.read_json("preprocessor.json")
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.dir.join(file);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not valid", path.display()))
    }
}
