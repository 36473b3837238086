pub mod core;
pub mod error;
pub mod models;
pub mod prelude;
pub mod utils;

// Re-export types
pub use crate::core::{BatchNorm, Dense, LayerGrads, Mode};
pub use crate::models::{FullyConnectedNet, NetConfig, TwoLayerNet};
