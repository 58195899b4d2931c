pub mod category;
pub mod food;
pub mod model;
pub mod preprocess;
pub mod topk;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to load model {path}: {source}")]
    Load {
        path: std::path::PathBuf,
        source: tch::TchError,
    },
    #[error("Model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model returned {actual} scores, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
    #[error("Model produced no usable score")]
    NoUsableScore,
    #[error("Model lock poisoned")]
    LockPoisoned,
}
