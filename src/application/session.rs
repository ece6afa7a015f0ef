// ============================================================
// Layer 2 — Trained Session
// ============================================================
// Rebuilds everything a finished training run left behind:
// config, network shape, fitted preprocessing and the weights,
// loaded onto the inference backend (eval mode, no autodiff).

use anyhow::Result;

use crate::application::train_use_case::TrainConfig;
use crate::data::preprocessor::TabularPreprocessor;
use crate::infra::{
    checkpoint::{artifact_name, load_model, CheckpointManager},
    storage::{open_store, BucketFsSettings, StoreLocation},
};
use crate::ml::{model::{StackedNet, StackedNetConfig}, InferBackend};

/// Where to find the weights of a finished run.
#[derive(Debug, Clone)]
pub struct StoreChoice {
    /// Overrides the location recorded at training time.
    pub location: Option<StoreLocation>,
    pub remote:   Option<BucketFsSettings>,
    /// Artifact stem (`autoencoder_<name>.pth`); derived from the
    /// recorded layers and wlc when absent.
    pub name:     Option<String>,
}

impl StoreChoice {
    pub fn local() -> Self {
        Self { location: Some(StoreLocation::Local), remote: None, name: None }
    }
}

pub struct TrainedSession {
    pub config:       TrainConfig,
    pub network:      StackedNetConfig,
    pub preprocessor: TabularPreprocessor,
    pub model:        StackedNet<InferBackend>,
    pub artifact:     String,
    pub device:       <InferBackend as burn::prelude::Backend>::Device,
}

impl TrainedSession {
    pub fn restore(checkpoint_dir: &str, choice: StoreChoice) -> Result<Self> {
        let ckpt         = CheckpointManager::open(checkpoint_dir)?;
        let config       = ckpt.load_config()?;
        let network      = ckpt.load_network()?;
        let preprocessor = ckpt.load_preprocessor()?;

        let name = choice.name.as_deref().or(config.name.as_deref());
        let artifact = artifact_name(&network.layers, config.wlc, name);

        let location = choice.location.unwrap_or(config.store);
        let store    = open_store(location, ckpt.dir(), choice.remote)?;

        let device = Default::default();
        let model  = load_model(network.init::<InferBackend>(&device), store.as_ref(), &artifact, &device)?;
        tracing::info!("Restored '{}' with layers {:?}", artifact, network.layers);

        Ok(Self { config, network, preprocessor, model, artifact, device })
    }
}
