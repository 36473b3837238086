pub use serde::{Deserialize, Serialize};
pub use std::fs::File;
pub use std::io::{Read, Write};

pub use ndarray::*;
pub use ndarray_rand::rand_distr::{Distribution, Normal, StandardNormal, Uniform};
pub use ndarray_rand::RandomExt;
pub use rand::distributions::uniform::SampleUniform;
pub use rand::rngs::StdRng;
pub use rand::SeedableRng;

pub use crate::error::*;
pub use crate::models::{FullyConnectedNet, NetConfig, TwoLayerNet};

// Internal re-exports
pub use crate::core::{
    affine_backward, affine_forward, affine_relu_backward, affine_relu_forward,
    batchnorm_backward, batchnorm_forward, dropout_backward, dropout_forward, l2_regularization,
    relu_backward, relu_forward, softmax_loss, write_matrix_to_csv, AffineCache, AffineReluCache,
    BatchNorm, BatchNormCache, Dense, DropoutCache, LayerGrads, Mode, ReluCache,
};
