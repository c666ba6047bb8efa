//! Error types for canopy

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for terrain generation, impostor baking and scene loading
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid parameters. Raised before any work is done.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A recognised option whose behavior is not implemented.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("failed to load resource {path}: {reason}")]
    ResourceLoad { path: PathBuf, reason: String },

    /// The surface sampler ran out of attempts before reaching the requested count.
    #[error("sampling exhausted: {accepted}/{requested} positions accepted after {attempts} attempts")]
    SamplingExhausted {
        requested: u32,
        accepted: u32,
        attempts: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Shorthand for [`Error::ResourceLoad`].
    pub fn resource(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ResourceLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error came from fetching an external asset.
    ///
    /// The scene loader tolerates these and completes with the affected
    /// content omitted; everything else aborts the load.
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Self::ResourceLoad { .. } | Self::Io(_) | Self::Image(_) | Self::Gltf(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::config("spritesPerSide must be >= 1");
        assert_eq!(err.to_string(), "configuration error: spritesPerSide must be >= 1");

        let err = Error::SamplingExhausted { requested: 10, accepted: 3, attempts: 640 };
        assert_eq!(
            err.to_string(),
            "sampling exhausted: 3/10 positions accepted after 640 attempts"
        );
    }

    #[test]
    fn test_resource_classification() {
        assert!(Error::resource("Pine_5.gltf", "missing").is_resource_error());
        assert!(Error::Io(std::io::Error::other("boom")).is_resource_error());
        assert!(!Error::config("bad").is_resource_error());
        assert!(!Error::Unsupported("full octahedron".into()).is_resource_error());
    }
}
