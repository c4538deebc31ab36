use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::{AssetError, Texture, TextureSource};

type LoadResult = Result<Texture, AssetError>;

/// Receiving half of an in-flight texture load.
///
/// Poll it without blocking from the frame loop with [`PendingTexture::try_take`],
/// or `.await` it. A load whose [`TextureCompleter`] is dropped resolves to
/// [`AssetError::LoadCancelled`]; one whose completer is kept alive but never
/// finished stays pending forever.
#[derive(Debug)]
pub struct PendingTexture {
    path: PathBuf,
    rx: Option<oneshot::Receiver<LoadResult>>,
}

/// Sending half of a texture load. Consumed by resolving or rejecting.
#[derive(Debug)]
pub struct TextureCompleter {
    path: PathBuf,
    tx: oneshot::Sender<LoadResult>,
}

impl PendingTexture {
    /// Create a linked completer/pending pair for `path`.
    pub fn channel(path: impl Into<PathBuf>) -> (TextureCompleter, PendingTexture) {
        let path = path.into();
        let (tx, rx) = oneshot::channel();
        (
            TextureCompleter {
                path: path.clone(),
                tx,
            },
            PendingTexture { path, rx: Some(rx) },
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once the result has been handed out.
    pub fn is_settled(&self) -> bool {
        self.rx.is_none()
    }

    /// Take the result if the load finished. Yields `Some` exactly once.
    pub fn try_take(&mut self) -> Option<LoadResult> {
        let rx = self.rx.as_mut()?;
        let outcome = match rx.try_recv() {
            Ok(None) => return None,
            Ok(Some(result)) => result,
            Err(oneshot::Canceled) => Err(self.cancelled()),
        };
        self.rx = None;
        Some(outcome)
    }

    fn cancelled(&self) -> AssetError {
        AssetError::LoadCancelled(self.path.display().to_string())
    }
}

impl Future for PendingTexture {
    type Output = LoadResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(Err(self.cancelled()));
        };
        match Pin::new(rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                let outcome = result.unwrap_or_else(|_| Err(self.cancelled()));
                self.rx = None;
                Poll::Ready(outcome)
            }
        }
    }
}

impl TextureCompleter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolve(self, texture: Texture) {
        self.finish(Ok(texture));
    }

    pub fn reject(self, error: AssetError) {
        self.finish(Err(error));
    }

    pub fn finish(self, result: LoadResult) {
        // The receiver may already be gone if the scene was torn down.
        if self.tx.send(result).is_err() {
            tracing::debug!(path = %self.path.display(), "texture load finished after receiver dropped");
        }
    }
}

/// Loads image files into RGBA textures on background threads.
#[derive(Debug, Clone, Default)]
pub struct TextureLoader;

impl TextureLoader {
    pub fn new() -> Self {
        Self
    }

    /// Start loading `path`. Returns immediately.
    pub fn load(&self, path: impl Into<PathBuf>) -> PendingTexture {
        let (completer, pending) = PendingTexture::channel(path);
        let path = completer.path().to_path_buf();
        tracing::debug!(path = %path.display(), "texture load started");

        let spawned = std::thread::Builder::new()
            .name("texture-loader".into())
            .spawn(move || {
                let result = std::fs::read(&path)
                    .map_err(AssetError::from)
                    .and_then(|bytes| decode_png(&path, &bytes));
                completer.finish(result);
            });

        // On spawn failure the completer is dropped with the closure,
        // which cancels the pending side.
        if let Err(e) = spawned {
            tracing::warn!("failed to spawn texture loader thread: {e}");
        }
        pending
    }
}

/// Decode an encoded image into an RGBA8 texture named after its file stem.
pub fn decode_png(path: &Path, bytes: &[u8]) -> Result<Texture, AssetError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = image.dimensions();
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("texture")
        .to_string();
    Ok(Texture {
        name,
        width,
        height,
        source: TextureSource::Pixels(image.into_raw()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for(pending: &mut PendingTexture) -> LoadResult {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = pending.try_take() {
                return result;
            }
            assert!(Instant::now() < deadline, "texture load timed out");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn channel_resolves_once() {
        let (completer, mut pending) = PendingTexture::channel("sprite.png");
        assert!(pending.try_take().is_none());
        assert!(!pending.is_settled());

        completer.resolve(Texture {
            name: "sprite".into(),
            width: 1,
            height: 1,
            source: TextureSource::Pixels(vec![255; 4]),
        });

        let texture = pending.try_take().unwrap().unwrap();
        assert_eq!(texture.name, "sprite");
        assert!(pending.is_settled());
        assert!(pending.try_take().is_none());
    }

    #[test]
    fn dropped_completer_cancels() {
        let (completer, mut pending) = PendingTexture::channel("gone.png");
        drop(completer);
        assert!(matches!(
            pending.try_take(),
            Some(Err(AssetError::LoadCancelled(_)))
        ));
    }

    #[test]
    fn unresolved_load_stays_pending() {
        let (_completer, mut pending) = PendingTexture::channel("slow.png");
        for _ in 0..10 {
            assert!(pending.try_take().is_none());
        }
    }

    #[test]
    fn awaiting_pending_texture() {
        let (completer, pending) = PendingTexture::channel("await.png");
        completer.reject(AssetError::NotFound(crate::AssetId(3)));
        let result = futures::executor::block_on(pending);
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }

    #[test]
    fn loader_decodes_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("particle.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 255, 128]))
            .save(&path)
            .unwrap();

        let mut pending = TextureLoader::new().load(&path);
        let texture = wait_for(&mut pending).unwrap();
        assert_eq!(texture.name, "particle");
        assert_eq!((texture.width, texture.height), (4, 2));
        match texture.source {
            TextureSource::Pixels(px) => {
                assert_eq!(px.len(), 4 * 2 * 4);
                assert_eq!(&px[..4], &[255, 0, 255, 128]);
            }
            TextureSource::Text(_) => panic!("expected pixels"),
        }
    }

    #[test]
    fn loader_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut pending = TextureLoader::new().load(dir.path().join("missing.png"));
        assert!(matches!(wait_for(&mut pending), Err(AssetError::Io(_))));
    }

    #[test]
    fn loader_reports_garbage_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let mut pending = TextureLoader::new().load(&path);
        assert!(matches!(wait_for(&mut pending), Err(AssetError::Decode(_))));
    }
}
