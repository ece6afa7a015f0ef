// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `clean` and
// `anonymize`, plus the BucketFS connection flags they share.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    anonymize_use_case::AnonymizeRequest,
    clean_use_case::CleanRequest,
    session::StoreChoice,
    train_use_case::TrainConfig,
};
use crate::data::splitter::SplitRatios;
use crate::infra::storage::{BucketFsSettings, StoreLocation};
use crate::ml::loss::LossWeights;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the autoencoder on a CSV table
    Train(TrainArgs),

    /// Reconstruct a dirty CSV table with a trained autoencoder
    Clean(CleanArgs),

    /// Encode a CSV table into latent vectors
    Anonymize(AnonymizeArgs),
}

// ─── BucketFS connection ──────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// BucketFS service URL, e.g. http://localhost:6583
    #[arg(long = "bucketfs-url", env = "BUCKETFS_URL")]
    pub url: Option<String>,

    #[arg(long = "bucketfs-bucket", env = "BUCKETFS_BUCKET", default_value = "default")]
    pub bucket: String,

    #[arg(long = "bucketfs-user", env = "BUCKETFS_USER", default_value = "w")]
    pub user: String,

    #[arg(long = "bucketfs-password", env = "BUCKETFS_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
}

impl RemoteArgs {
    /// Settings only exist once a URL is known.
    pub fn settings(&self) -> Option<BucketFsSettings> {
        self.url.as_ref().map(|url| BucketFsSettings {
            url:      url.clone(),
            bucket:   self.bucket.clone(),
            user:     self.user.clone(),
            password: self.password.clone(),
        })
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// CSV file with a header row
    #[arg(long)]
    pub data: String,

    /// Directory for side files, metrics and local weights
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Continuous (numeric) columns, comma separated
    #[arg(long, value_delimiter = ',')]
    pub continuous: Vec<String>,

    /// Categorical columns, comma separated
    #[arg(long, value_delimiter = ',')]
    pub categorical: Vec<String>,

    /// Hidden layer widths after the input layer, e.g. 64,16
    #[arg(long, value_delimiter = ',', default_values_t = [64usize, 16])]
    pub layers: Vec<usize>,

    /// Batch norm after every encoder layer
    #[arg(long)]
    pub batch_norm: bool,

    /// Encoder dropout as layer:probability, e.g. 0:0.1,1:0.1
    #[arg(long, value_delimiter = ',', value_parser = parse_dropout)]
    pub dropout_enc: Vec<(usize, f64)>,

    /// Decoder dropout as layer:probability, counted from the latent side
    #[arg(long, value_delimiter = ',', value_parser = parse_dropout)]
    pub dropout_dec: Vec<(usize, f64)>,

    /// L1 activation penalty strength
    #[arg(long, default_value_t = 0.0)]
    pub l1: f64,

    /// L2 activation penalty strength
    #[arg(long, default_value_t = 0.0)]
    pub l2: f64,

    /// Loss weights as ce,mse
    #[arg(long, value_parser = parse_wlc, default_value = "1,1")]
    pub wlc: LossWeights,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Epochs without a 0.001 validation improvement before stopping
    #[arg(long, default_value_t = 15)]
    pub patience: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// AdamW weight decay
    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f64,

    /// Decay the learning rate every this many epochs (0 = never)
    #[arg(long, default_value_t = 25)]
    pub lr_step: usize,

    /// Learning-rate decay factor
    #[arg(long, default_value_t = 0.1)]
    pub lr_gamma: f64,

    /// Split ratios as train,val,test
    #[arg(long, value_parser = parse_split, default_value = "0.7,0.15,0.15")]
    pub split: SplitRatios,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Where to save the trained weights
    #[arg(long, value_enum, default_value_t = StoreLocation::Local)]
    pub store: StoreLocation,

    /// Artifact name; saved as autoencoder_<name>.pth
    #[arg(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<&TrainArgs> for TrainConfig {
    fn from(a: &TrainArgs) -> Self {
        TrainConfig {
            data_path:      a.data.clone(),
            checkpoint_dir: a.checkpoint_dir.clone(),
            continuous:     a.continuous.clone(),
            categorical:    a.categorical.clone(),
            hidden_layers:  a.layers.clone(),
            batch_norm:     a.batch_norm,
            dropout_enc:    a.dropout_enc.clone(),
            dropout_dec:    a.dropout_dec.clone(),
            l1_strength:    a.l1,
            l2_strength:    a.l2,
            wlc:            a.wlc,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            patience:       a.patience,
            lr:             a.lr,
            weight_decay:   a.weight_decay,
            lr_step_size:   a.lr_step,
            lr_gamma:       a.lr_gamma,
            split:          a.split,
            seed:           a.seed,
            store:          a.store,
            name:           a.name.clone(),
        }
    }
}

// ─── clean ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// CSV file to clean
    #[arg(long)]
    pub input: PathBuf,

    /// Clean version of --input, for MAE/MSE diagnostics
    #[arg(long)]
    pub truth: Option<PathBuf>,

    /// Where to write the cleaned CSV
    #[arg(long, default_value = "cleaned.csv")]
    pub output: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

impl From<&CleanArgs> for CleanRequest {
    fn from(a: &CleanArgs) -> Self {
        CleanRequest {
            checkpoint_dir: a.model.checkpoint_dir.clone(),
            dirty_path:     a.input.clone(),
            truth_path:     a.truth.clone(),
            output_path:    a.output.clone(),
            batch_size:     a.model.batch_size,
            store:          a.model.store_choice(),
        }
    }
}

// ─── anonymize ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// CSV file to encode
    #[arg(long)]
    pub input: PathBuf,

    /// Where to write the latent CSV
    #[arg(long, default_value = "anonymized.csv")]
    pub output: PathBuf,

    /// Fit a classifier on the latent vectors to predict this column
    /// and report its held-out accuracy
    #[arg(long)]
    pub probe_target: Option<String>,

    #[command(flatten)]
    pub model: ModelArgs,
}

impl From<&AnonymizeArgs> for AnonymizeRequest {
    fn from(a: &AnonymizeArgs) -> Self {
        AnonymizeRequest {
            checkpoint_dir: a.model.checkpoint_dir.clone(),
            input_path:     a.input.clone(),
            output_path:    a.output.clone(),
            batch_size:     a.model.batch_size,
            store:          a.model.store_choice(),
            probe_target:   a.probe_target.clone(),
        }
    }
}

/// Flags shared by the inference commands.
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Directory written by `train`
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Override the training batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override where the weights are loaded from
    #[arg(long, value_enum)]
    pub store: Option<StoreLocation>,

    /// Load autoencoder_<name>.pth instead of the name recorded at training
    #[arg(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl ModelArgs {
    fn store_choice(&self) -> StoreChoice {
        StoreChoice {
            location: self.store,
            remote:   self.remote.settings(),
            name:     self.name.clone(),
        }
    }
}

/// `layer:probability` → `(layer, probability)`
fn parse_dropout(s: &str) -> Result<(usize, f64), String> {
    let (layer, p) = s
        .split_once(':')
        .ok_or_else(|| format!("expected layer:probability, got '{s}'"))?;
    let layer = layer.trim().parse().map_err(|e| format!("bad layer index '{layer}': {e}"))?;
    let p: f64 = p.trim().parse().map_err(|e| format!("bad probability '{p}': {e}"))?;
    if !(0.0..1.0).contains(&p) {
        return Err(format!("probability {p} outside [0, 1)"));
    }
    Ok((layer, p))
}

/// `ce,mse` → `LossWeights`
fn parse_wlc(s: &str) -> Result<LossWeights, String> {
    let [ce, mse] = parse_floats::<2>(s)?;
    Ok(LossWeights::new(ce, mse))
}

/// `train,val,test` → `SplitRatios`
fn parse_split(s: &str) -> Result<SplitRatios, String> {
    let [train, val, test] = parse_floats::<3>(s)?;
    Ok(SplitRatios { train, val, test })
}

/// Exactly `N` comma-separated numbers.
fn parse_floats<const N: usize>(s: &str) -> Result<[f64; N], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("bad number '{}': {e}", v.trim())))
        .collect::<Result<Vec<_>, _>>()?;
    <[f64; N]>::try_from(values)
        .map_err(|v| format!("expected {N} comma-separated values, got {} in '{s}'", v.len()))
}
