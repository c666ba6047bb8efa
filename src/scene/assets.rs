//! Asynchronous asset loading for scene setup

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;

use crate::core::{Error, Result};
use crate::impostor::target::TargetMesh;

/// Source of the tree model and ground texture.
///
/// Failures are reported as [`Error::ResourceLoad`] so the scene loader can
/// tell them apart from configuration mistakes.
pub trait AssetLoader: Sync {
    fn load_model(&self, path: &Path) -> impl Future<Output = Result<TargetMesh>> + Send;

    fn load_texture(&self, path: &Path) -> impl Future<Output = Result<Arc<RgbaImage>>> + Send;
}

/// Loads assets from the local filesystem, relative to `root` unless absolute
#[derive(Clone, Debug)]
pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl AssetLoader for FsAssetLoader {
    async fn load_model(&self, path: &Path) -> Result<TargetMesh> {
        let full = self.resolve(path);
        let task_path = full.clone();
        // glTF import reads external buffers and images synchronously
        tokio::task::spawn_blocking(move || TargetMesh::import_gltf(&task_path))
            .await
            .map_err(|e| Error::resource(&full, e))?
    }

    async fn load_texture(&self, path: &Path) -> Result<Arc<RgbaImage>> {
        let full = self.resolve(path);
        let bytes = tokio::fs::read(&full).await.map_err(|e| Error::resource(&full, e))?;
        let image = image::load_from_memory(&bytes).map_err(|e| Error::resource(&full, e))?;
        log::debug!("Loaded texture {} ({}x{})", full.display(), image.width(), image.height());
        Ok(Arc::new(image.to_rgba8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[tokio::test]
    async fn test_load_texture() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = RgbaImage::new(4, 2);
        img.put_pixel(1, 1, Rgba([10, 20, 30, 255]));
        img.save(dir.path().join("ground.png")).unwrap();

        let loader = FsAssetLoader::new(dir.path());
        let texture = loader.load_texture(Path::new("ground.png")).await.unwrap();
        assert_eq!(texture.dimensions(), (4, 2));
        assert_eq!(*texture.get_pixel(1, 1), Rgba([10, 20, 30, 255]));
    }

    #[tokio::test]
    async fn test_missing_assets_are_resource_errors() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsAssetLoader::new(dir.path());

        let err = loader.load_texture(Path::new("nope.jpg")).await.unwrap_err();
        assert!(matches!(&err, Error::ResourceLoad { path, .. } if path.ends_with("nope.jpg")));

        let err = loader.load_model(Path::new("nope.gltf")).await.unwrap_err();
        assert!(err.is_resource_error());
    }

    #[tokio::test]
    async fn test_corrupt_texture() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not an image").unwrap();
        let loader = FsAssetLoader::new(dir.path());
        let err = loader.load_texture(Path::new("bad.png")).await.unwrap_err();
        assert!(matches!(err, Error::ResourceLoad { .. }));
    }

    #[test]
    fn test_resolve() {
        let loader = FsAssetLoader::new("/assets");
        assert_eq!(loader.resolve(Path::new("tree.glb")), PathBuf::from("/assets/tree.glb"));
        assert_eq!(loader.resolve(Path::new("/abs/tree.glb")), PathBuf::from("/abs/tree.glb"));
    }
}
