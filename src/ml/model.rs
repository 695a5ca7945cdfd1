use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::{MseLoss, Reduction},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{leaky_relu, relu},
};

use crate::domain::error::PipelineError;

/// Output channels of the twelve convolution blocks.
pub const BLOCK_WIDTHS: [usize; 12] = [32, 32, 64, 64, 96, 96, 128, 128, 256, 256, 512, 512];

/// Five 2×2 pools, so both input sides must be at least this long.
pub const MIN_INPUT_SIZE: usize = 32;

const HIDDEN_UNITS: usize = 512;

// Keras-compatible normalisation: running stats keep 99% per step.
const NORM_MOMENTUM: f64 = 0.01;
const NORM_EPSILON:  f64 = 1e-3;

/// A 2×2 pool follows every second block except the last one.
fn pools_after(block: usize) -> bool {
    block % 2 == 1 && block + 1 < BLOCK_WIDTHS.len()
}

// Config already derives Clone, Serialize and Deserialize.
#[derive(Config, Debug)]
pub struct LandmarkNetConfig {
    pub height:      usize,
    pub width:       usize,
    pub n_landmarks: usize,
    #[config(default = 0.1)]
    pub leaky_slope: f64,
}

impl LandmarkNetConfig {
    /// Regression outputs: `2 × n_landmarks`.
    pub fn output_dim(&self) -> usize {
        2 * self.n_landmarks
    }

    /// Length of the flattened feature map entering the dense head.
    pub fn feature_size(&self) -> usize {
        let pools = (0..BLOCK_WIDTHS.len()).filter(|&b| pools_after(b)).count();
        let (h, w) = (self.height >> pools, self.width >> pools);
        BLOCK_WIDTHS[BLOCK_WIDTHS.len() - 1] * h * w
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if self.height < MIN_INPUT_SIZE || self.width < MIN_INPUT_SIZE {
            return Err(PipelineError::ImageTooSmall {
                width:  self.width as u32,
                height: self.height as u32,
                min:    MIN_INPUT_SIZE as u32,
            });
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LandmarkNet<B> {
        let mut in_channels = 1;
        let blocks = BLOCK_WIDTHS
            .iter()
            .map(|&out_channels| {
                let block   = self.build_block(in_channels, out_channels, device);
                in_channels = out_channels;
                block
            })
            .collect();

        let pool   = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let hidden = LinearConfig::new(self.feature_size(), HIDDEN_UNITS).init(device);
        let head   = LinearConfig::new(HIDDEN_UNITS, self.output_dim()).init(device);
        LandmarkNet { blocks, pool, hidden, head }
    }

    fn build_block<B: Backend>(&self, in_channels: usize, out_channels: usize, device: &B::Device) -> ConvBlock<B> {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .with_bias(false)
            .init(device);
        let norm = BatchNormConfig::new(out_channels)
            .with_momentum(NORM_MOMENTUM)
            .with_epsilon(NORM_EPSILON)
            .init(device);
        ConvBlock {
            conv,
            norm,
            leaky_slope:  self.leaky_slope,
            norm_epsilon: NORM_EPSILON,
            norm_frozen:  false,
        }
    }
}

/// conv 3×3 (same, no bias) → leaky ReLU → batch norm
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv:         Conv2d<B>,
    pub norm:         BatchNorm<B, 2>,
    pub leaky_slope:  f64,
    pub norm_epsilon: f64,
    pub norm_frozen:  bool,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = leaky_relu(self.conv.forward(x), self.leaky_slope);
        if self.norm_frozen {
            self.frozen_norm(x)
        } else {
            self.norm.forward(x)
        }
    }

    /// Inference-mode normalisation with the stored running stats,
    /// whatever the backend. Nothing here updates those stats.
    fn frozen_norm(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = x.dims();
        let shape = [1, channels, 1, 1];

        let mean  = self.norm.running_mean.value().reshape(shape);
        let var   = self.norm.running_var.value().reshape(shape);
        let gamma = self.norm.gamma.val().reshape(shape);
        let beta  = self.norm.beta.val().reshape(shape);

        (x - mean) / var.add_scalar(self.norm_epsilon).sqrt() * gamma + beta
    }

    fn freeze(mut self) -> Self {
        self.norm.gamma  = self.norm.gamma.set_require_grad(false);
        self.norm.beta   = self.norm.beta.set_require_grad(false);
        self.norm_frozen = true;
        self
    }
}

#[derive(Module, Debug)]
pub struct LandmarkNet<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub pool:   MaxPool2d,
    pub hidden: Linear<B>,
    pub head:   Linear<B>,
}

impl<B: Backend> LandmarkNet<B> {
    /// images: [batch, 1, H, W] → coordinates: [batch, 2 × n_landmarks]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for (i, block) in self.blocks.iter().enumerate() {
            x = block.forward(x);
            if pools_after(i) {
                x = self.pool.forward(x);
            }
        }
        let x = relu(self.hidden.forward(x.flatten::<2>(1, 3)));
        self.head.forward(x)
    }

    /// Mean squared error over every coordinate, plus the raw output.
    pub fn forward_loss(&self, images: Tensor<B, 4>, targets: Tensor<B, 2>) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let output = self.forward(images);
        let loss   = MseLoss::new().forward(output.clone(), targets, Reduction::Mean);
        (loss, output)
    }

    /// Fix every normalisation layer: running statistics are used
    /// as-is and gamma/beta stop receiving gradients.
    pub fn freeze_normalization(self) -> Self {
        let Self { blocks, pool, hidden, head } = self;
        let blocks = blocks.into_iter().map(ConvBlock::freeze).collect();
        Self { blocks, pool, hidden, head }
    }

    pub fn is_normalization_frozen(&self) -> bool {
        self.blocks.iter().all(|b| b.norm_frozen)
    }
}
