// src/core.rs
pub mod activations;
pub mod layers;
pub mod losses;
pub mod output;

// Re-export commonly used items
pub use activations::{relu_backward, relu_forward, ReluCache};
pub use layers::{
    affine_backward, affine_forward, affine_relu_backward, affine_relu_forward,
    batchnorm_backward, batchnorm_forward, dropout_backward, dropout_forward, AffineCache,
    AffineReluCache, BatchNorm, BatchNormCache, Dense, DropoutCache, LayerGrads, Mode,
};
pub use losses::{l2_regularization, softmax_loss};
pub use output::write_matrix_to_csv;
