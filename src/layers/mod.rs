//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait and the layer types the encoders and
//! relation transforms are assembled from.

mod r#trait;
pub mod conv1d;
pub mod dense;
pub mod dropout;

pub use conv1d::Conv1DLayer;
pub use dense::DenseLayer;
pub use dropout::DropoutLayer;
// Re-export the Layer trait for convenience
pub use r#trait::Layer;
