//! Shared utilities for the network components
//!
//! Random number generation, activation functions, the GEMM helper and the
//! learning rate schedule used across models and the training loop.

pub mod activations;
pub mod lr_scheduler;
pub mod ops;
pub mod rng;

pub use rng::SeededRng;
