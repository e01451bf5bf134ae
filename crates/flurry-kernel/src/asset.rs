//! Background image loading.
//!
//! Images are read and decoded on a worker thread. The result is delivered
//! through a one-shot channel and consumed on the frame thread by polling, so
//! a texture becomes available at some later tick without ever blocking a frame.

use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use flurry_common::AssetError;
use tracing::debug;

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 pixel data, row-major, top row first
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// Decodes an encoded image (PNG or JPEG) from memory.
    pub fn decode(bytes: &[u8], path: &Path) -> Result<Self, AssetError> {
        let image = image::load_from_memory(bytes).map_err(|e| AssetError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }

    /// Reads and decodes an image file.
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        if !path.exists() {
            return Err(AssetError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|e| AssetError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::decode(&bytes, path)
    }

    /// Solid single-colour image.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        Self {
            width,
            height,
            rgba: rgba.repeat(pixels),
        }
    }

    /// Copy with rows in reverse order.
    #[must_use]
    pub fn flipped_vertically(&self) -> Self {
        let row = self.width as usize * 4;
        let rgba = if row == 0 {
            Vec::new()
        } else {
            self.rgba
                .chunks_exact(row)
                .rev()
                .flatten()
                .copied()
                .collect()
        };
        Self {
            width: self.width,
            height: self.height,
            rgba,
        }
    }
}

/// Texture role in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Repeating ground texture
    Ground,
    /// Equirectangular sky background
    Skybox,
    /// Snowflake sprite
    Snowflake,
}

impl TextureSlot {
    /// Get the display name for this slot.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Skybox => "skybox",
            Self::Snowflake => "snowflake",
        }
    }
}

/// State of a pending load.
#[derive(Debug)]
pub enum AssetPoll {
    /// Still loading
    Pending,
    /// Finished, successfully or not. Returned at most once.
    Ready(Result<DecodedImage, AssetError>),
}

/// One-shot handle to an image being loaded in the background.
#[derive(Debug)]
pub struct PendingAsset {
    path: PathBuf,
    receiver: Option<Receiver<Result<DecodedImage, AssetError>>>,
}

impl PendingAsset {
    /// Starts loading `path` on a worker thread.
    #[must_use]
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (sender, receiver) = bounded(1);
        let worker_path = path.clone();

        let spawned = thread::Builder::new()
            .name("flurry-asset".into())
            .spawn(move || {
                let result = DecodedImage::load(&worker_path);
                // The receiver may already be gone if the engine was torn down.
                let _ = sender.send(result);
            });

        match spawned {
            Ok(_) => {
                debug!("Loading asset {}", path.display());
                Self {
                    path,
                    receiver: Some(receiver),
                }
            },
            Err(e) => Self::resolved(
                path.clone(),
                Err(AssetError::Read {
                    path,
                    message: e.to_string(),
                }),
            ),
        }
    }

    /// Handle whose result is already known.
    #[must_use]
    pub fn resolved(path: impl Into<PathBuf>, result: Result<DecodedImage, AssetError>) -> Self {
        let (sender, receiver) = bounded(1);
        let _ = sender.send(result);
        Self {
            path: path.into(),
            receiver: Some(receiver),
        }
    }

    /// Path being loaded.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once the result has been taken.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.receiver.is_none()
    }

    /// Non-blocking check for the result.
    pub fn poll(&mut self) -> AssetPoll {
        let Some(receiver) = &self.receiver else {
            return AssetPoll::Pending;
        };

        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return AssetPoll::Pending,
            Err(TryRecvError::Disconnected) => Err(AssetError::Canceled),
        };
        self.receiver = None;
        AssetPoll::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let image = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([x as u8, y as u8, 0, 255])
        });
        image.save(&path).expect("write png");
        path
    }

    fn wait(pending: &mut PendingAsset) -> Result<DecodedImage, AssetError> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let AssetPoll::Ready(result) = pending.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "asset load timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_png(dir.path(), "grass.png", 4, 2);

        let image = DecodedImage::load(&path).expect("decode");
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(image.rgba.len(), 4 * 2 * 4);
        assert_eq!(&image.rgba[4..8], &[1, 0, 0, 255]);
    }

    #[test]
    fn test_missing_file() {
        let err = DecodedImage::load(Path::new("/nonexistent/sky.jpg")).expect_err("missing");
        assert!(matches!(err, AssetError::NotFound(_)));
    }

    #[test]
    fn test_garbage_fails_decode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").expect("write");

        let err = DecodedImage::load(&path).expect_err("garbage");
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn test_background_load_resolves_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_png(dir.path(), "snowflake.png", 8, 8);

        let mut pending = PendingAsset::spawn(&path);
        let image = wait(&mut pending).expect("loaded");
        assert_eq!(image.width, 8);
        assert!(pending.is_finished());
        assert!(matches!(pending.poll(), AssetPoll::Pending));
    }

    #[test]
    fn test_background_load_reports_failure() {
        let mut pending = PendingAsset::spawn("/nonexistent/grass.png");
        assert!(matches!(wait(&mut pending), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_flip_reverses_rows() {
        let mut image = DecodedImage::solid(2, 2, [0, 0, 0, 255]);
        image.rgba[0] = 9;
        let flipped = image.flipped_vertically();
        assert_eq!(flipped.rgba[8], 9);
        assert_eq!(flipped.rgba[0], 0);
        assert_eq!(flipped.flipped_vertically(), image);
    }
}
