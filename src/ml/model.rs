use anyhow::{bail, Result};
use burn::{
    nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

/// What sits after the hidden stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminalPolicy {
    /// Mirrored decoder plus a closing `Linear(layers[0], layers[0])`.
    Reconstruction,
    /// A single `Linear(layers.last, classes)` producing class logits.
    Classification { classes: usize },
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct StackedNetConfig {
    /// Encoder widths, input → latent. `layers[0]` is the feature width.
    pub layers: Vec<usize>,
    /// Batch norm after every encoder linear layer.
    #[config(default = false)]
    pub batch_norm: bool,
    /// `(encoder_layer_index, drop_probability)`
    #[config(default = "Vec::new()")]
    pub dropout_enc: Vec<(usize, f64)>,
    /// `(decoder_layer_index, drop_probability)`, indices counted from the latent side.
    #[config(default = "Vec::new()")]
    pub dropout_dec: Vec<(usize, f64)>,
    #[config(default = 0.0)]
    pub l1_strength: f64,
    #[config(default = 0.0)]
    pub l2_strength: f64,
    #[config(default = "TerminalPolicy::Reconstruction")]
    pub head: TerminalPolicy,
}

impl StackedNetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.layers.len() < 2 {
            bail!("need at least two layer widths, got {:?}", self.layers);
        }
        if self.layers.contains(&0) {
            bail!("layer widths must be positive, got {:?}", self.layers);
        }
        if let TerminalPolicy::Classification { classes: 0 } = self.head {
            bail!("classification head needs at least one class");
        }
        for &(_, p) in self.dropout_enc.iter().chain(&self.dropout_dec) {
            if !(0.0..1.0).contains(&p) {
                bail!("dropout probability {p} outside [0, 1)");
            }
        }
        Ok(())
    }

    pub fn latent_width(&self) -> usize {
        self.layers[self.layers.len() - 1]
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> StackedNet<B> {
        let n = self.layers.len();

        let encoder = (0..n - 1)
            .map(|i| {
                DenseBlock::new(
                    self.layers[i],
                    self.layers[i + 1],
                    self.batch_norm,
                    dropout_at(&self.dropout_enc, i),
                    device,
                )
            })
            .collect();

        let (decoder, head) = match self.head {
            TerminalPolicy::Reconstruction => {
                let decoder = (0..n - 1)
                    .map(|j| {
                        let i = n - 1 - j;
                        DenseBlock::new(
                            self.layers[i],
                            self.layers[i - 1],
                            false,
                            dropout_at(&self.dropout_dec, j),
                            device,
                        )
                    })
                    .collect();
                (decoder, LinearConfig::new(self.layers[0], self.layers[0]).init(device))
            }
            TerminalPolicy::Classification { classes } => {
                (Vec::new(), LinearConfig::new(self.layers[n - 1], classes).init(device))
            }
        };

        StackedNet {
            encoder,
            decoder,
            head,
            l1_strength: self.l1_strength,
            l2_strength: self.l2_strength,
        }
    }
}

fn dropout_at(plan: &[(usize, f64)], layer: usize) -> Option<f64> {
    plan.iter().find(|(l, _)| *l == layer).map(|&(_, p)| p)
}

/// Linear → [BatchNorm] → ReLU, with the dropout applied by the caller
/// after any activation penalty.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    pub linear:  Linear<B>,
    pub norm:    Option<BatchNorm<B, 1>>,
    pub dropout: Option<Dropout>,
}

impl<B: Backend> DenseBlock<B> {
    fn new(
        d_in: usize,
        d_out: usize,
        batch_norm: bool,
        dropout: Option<f64>,
        device: &B::Device,
    ) -> Self {
        Self {
            linear:  LinearConfig::new(d_in, d_out).init(device),
            norm:    batch_norm.then(|| BatchNormConfig::new(d_out).init(device)),
            dropout: dropout.map(|p| DropoutConfig::new(p).init()),
        }
    }

    pub fn activate(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = match &self.norm {
            Some(bn) => {
                let [batch, features] = x.dims();
                bn.forward(x.reshape([batch, features, 1])).reshape([batch, features])
            }
            None => x,
        };
        relu(x)
    }

    pub fn apply_dropout(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match &self.dropout {
            Some(d) => d.forward(x),
            None => x,
        }
    }
}

/// Network output plus the activation penalty accrued during this pass.
pub struct NetOutput<B: Backend> {
    pub output:  Tensor<B, 2>,
    /// Shape [1]; exactly zero when both strengths are zero.
    pub penalty: Tensor<B, 1>,
}

#[derive(Module, Debug)]
pub struct StackedNet<B: Backend> {
    pub encoder:     Vec<DenseBlock<B>>,
    pub decoder:     Vec<DenseBlock<B>>,
    pub head:        Linear<B>,
    pub l1_strength: f64,
    pub l2_strength: f64,
}

impl<B: Backend> StackedNet<B> {
    /// x: [batch, input_width] → latent [batch, latent_width] and its penalty.
    ///
    /// Every encoder activation `a` gets `l1 * mean|a| + l2 * mean(a²)`
    /// added to it before propagating; the same amount is summed into
    /// the returned penalty.
    pub fn encode(&self, x: Tensor<B, 2>) -> NetOutput<B> {
        let mut penalty = Tensor::zeros([1], &x.device());
        let mut x = x;
        for block in &self.encoder {
            let mut a = block.activate(x);
            if let Some(p) = self.activation_penalty(&a) {
                a = a + p.clone().reshape([1, 1]);
                penalty = penalty + p;
            }
            x = block.apply_dropout(a);
        }
        NetOutput { output: x, penalty }
    }

    /// x: [batch, input_width] → [batch, input_width] (reconstruction)
    /// or [batch, classes] (classification).
    pub fn forward(&self, x: Tensor<B, 2>) -> NetOutput<B> {
        let NetOutput { output, penalty } = self.encode(x);
        let mut x = output;
        for block in &self.decoder {
            x = block.apply_dropout(block.activate(x));
        }
        NetOutput { output: self.head.forward(x), penalty }
    }

    fn activation_penalty(&self, a: &Tensor<B, 2>) -> Option<Tensor<B, 1>> {
        if self.l1_strength == 0.0 && self.l2_strength == 0.0 {
            return None;
        }
        let l1 = a.clone().abs().mean().mul_scalar(self.l1_strength);
        let l2 = a.clone().powf_scalar(2.0).mean().mul_scalar(self.l2_strength);
        Some(l1 + l2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn input(rows: usize, cols: usize) -> Tensor<TestBackend, 2> {
        let values: Vec<f32> = (0..rows * cols).map(|v| (v % 7) as f32 * 0.3 - 0.5).collect();
        Tensor::<TestBackend, 1>::from_floats(values.as_slice(), &Default::default())
            .reshape([rows, cols])
    }

    #[test]
    fn test_reconstruction_restores_input_width() {
        let net = StackedNetConfig::new(vec![5, 4, 3]).init::<TestBackend>(&Default::default());
        assert_eq!(net.encoder.len(), 2);
        assert_eq!(net.decoder.len(), 2);
        assert_eq!(net.encode(input(2, 5)).output.dims(), [2, 3]);
        assert_eq!(net.forward(input(2, 5)).output.dims(), [2, 5]);
    }

    #[test]
    fn test_classification_head() {
        let net = StackedNetConfig::new(vec![5, 4])
            .with_head(TerminalPolicy::Classification { classes: 2 })
            .init::<TestBackend>(&Default::default());
        assert!(net.decoder.is_empty());
        assert_eq!(net.forward(input(3, 5)).output.dims(), [3, 2]);
    }

    #[test]
    fn test_dropout_indices() {
        let net = StackedNetConfig::new(vec![6, 5, 4, 3])
            .with_dropout_enc(vec![(0, 0.1)])
            .with_dropout_dec(vec![(2, 0.2)])
            .init::<TestBackend>(&Default::default());
        let enc: Vec<bool> = net.encoder.iter().map(|b| b.dropout.is_some()).collect();
        let dec: Vec<bool> = net.decoder.iter().map(|b| b.dropout.is_some()).collect();
        assert_eq!(enc, vec![true, false, false]);
        assert_eq!(dec, vec![false, false, true]);
    }

    #[test]
    fn test_batch_norm_on_encoder_only() {
        let net = StackedNetConfig::new(vec![5, 4, 3])
            .with_batch_norm(true)
            .init::<TestBackend>(&Default::default());
        assert!(net.encoder.iter().all(|b| b.norm.is_some()));
        assert!(net.decoder.iter().all(|b| b.norm.is_none()));
        assert_eq!(net.forward(input(4, 5)).output.dims(), [4, 5]);
    }

    #[test]
    fn test_penalty_zero_by_default() {
        let net = StackedNetConfig::new(vec![5, 3]).init::<TestBackend>(&Default::default());
        let penalty: f32 = net.forward(input(2, 5)).penalty.into_scalar();
        assert_eq!(penalty, 0.0);
    }

    #[test]
    fn test_penalty_does_not_accumulate_across_calls() {
        let net = StackedNetConfig::new(vec![5, 4, 3])
            .with_l1_strength(0.1)
            .with_l2_strength(0.05)
            .init::<TestBackend>(&Default::default());
        let first: f32  = net.forward(input(2, 5)).penalty.into_scalar();
        let second: f32 = net.forward(input(2, 5)).penalty.into_scalar();
        assert!(first >= 0.0);
        assert!((first - second).abs() < 1e-6);
    }

    #[test]
    fn test_validate_rejects_bad_layer_lists() {
        assert!(StackedNetConfig::new(vec![5]).validate().is_err());
        assert!(StackedNetConfig::new(vec![5, 0]).validate().is_err());
        assert!(StackedNetConfig::new(vec![5, 3]).with_dropout_enc(vec![(0, 1.5)]).validate().is_err());
        assert!(StackedNetConfig::new(vec![5, 3]).validate().is_ok());
    }
}
