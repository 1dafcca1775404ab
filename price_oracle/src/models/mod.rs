//! Shared model artifact and its trainer

pub mod artifact;
pub mod trainer;

pub use artifact::{ArtifactPaths, ModelArtifact};
pub use trainer::{ModelTrainer, TrainingOutcome, TrainingReport};
