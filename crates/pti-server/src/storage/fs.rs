use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{ByteStream, ObjectMeta, Storage, StorageError};

/// Prefix of in-progress writes. Stored names may not start with a dot, so
/// these never collide with a real file.
const TEMP_PREFIX: &str = ".upload-";

pub struct FsStorage {
    base_path: PathBuf,
}

impl FsStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory holding the stored files.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// Path of a stored file. Only single plain components that do not start
    /// with a dot are accepted.
    fn file_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0']);
        if !plain {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.base_path.join(name))
    }

    /// Atomic write: write to tempfile, then rename
    async fn atomic_write(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
        })?;

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(parent)?;
        fs::write(temp.path(), data).await?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn not_found_or_io(e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn free_name(&self, candidate: &str) -> Result<String, StorageError> {
        let mut counter = 0;
        loop {
            let name = pti::numbered_name(candidate, counter);
            let path = self.file_path(&name)?;
            if !fs::try_exists(&path).await? {
                return Ok(name);
            }
            debug!(%name, "Stored name taken, trying next");
            counter += 1;
        }
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.file_path(name)?;
        self.atomic_write(&path, &data).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ByteStream, StorageError> {
        let path = self.file_path(name)?;
        let file = File::open(&path).await.map_err(not_found_or_io)?;

        // Use a buffered reader with reasonable chunk size (64KB)
        let reader = BufReader::with_capacity(64 * 1024, file);
        let stream = ReaderStream::new(reader);

        // Map the stream to our error type
        let mapped = stream.map(|result| result.map_err(StorageError::Io));

        Ok(Box::new(mapped))
    }

    async fn meta(&self, name: &str) -> Result<ObjectMeta, StorageError> {
        let path = self.file_path(name)?;
        let metadata = fs::metadata(&path).await.map_err(not_found_or_io)?;

        if !metadata.is_file() {
            return Err(StorageError::NotFound);
        }

        Ok(ObjectMeta {
            size: metadata.len(),
        })
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        // If directory doesn't exist, return empty list
        if !fs::try_exists(&self.base_path).await? {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    async fn read_back(storage: &FsStorage, name: &str) -> Bytes {
        let stream = storage.get(name).await.unwrap();
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        Bytes::from(chunks.concat())
    }

    async fn storage() -> (tempfile::TempDir, FsStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path().join("uploads"));
        storage.init().await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let (_dir, storage) = storage().await;
        storage.init().await.unwrap();
        assert!(storage.base_path().is_dir());
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_dir, storage) = storage().await;
        storage
            .put("cat.png", Bytes::from_static(b"meow"))
            .await
            .unwrap();

        assert_eq!(storage.meta("cat.png").await.unwrap().size, 4);
        assert_eq!(read_back(&storage, "cat.png").await, "meow");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_dir, storage) = storage().await;
        assert!(matches!(
            storage.get("nope.png").await,
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            storage.meta("nope.png").await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn free_name_probes_with_counter() {
        let (_dir, storage) = storage().await;

        assert_eq!(storage.free_name("cat.png").await.unwrap(), "cat.png");
        storage.put("cat.png", Bytes::from_static(b"1")).await.unwrap();
        assert_eq!(storage.free_name("cat.png").await.unwrap(), "cat_1.png");
        storage.put("cat_1.png", Bytes::from_static(b"2")).await.unwrap();
        assert_eq!(storage.free_name("cat.png").await.unwrap(), "cat_2.png");
    }

    #[tokio::test]
    async fn put_replaces_existing_file() {
        let (_dir, storage) = storage().await;
        storage.put("a.gif", Bytes::from_static(b"old")).await.unwrap();
        storage.put("a.gif", Bytes::from_static(b"new")).await.unwrap();
        assert_eq!(read_back(&storage, "a.gif").await, "new");
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let (_dir, storage) = storage().await;
        for name in [
            "",
            ".",
            "..",
            "../escape.png",
            "a/b.png",
            r"a\b.png",
            ".hidden.png",
            ".upload-cat.png",
        ] {
            assert!(
                matches!(
                    storage.put(name, Bytes::from_static(b"x")).await,
                    Err(StorageError::InvalidName(_))
                ),
                "accepted {name:?}"
            );
        }
    }

    #[tokio::test]
    async fn list_returns_stored_files_only() {
        let (_dir, storage) = storage().await;
        storage.put("b.png", Bytes::from_static(b"b")).await.unwrap();
        storage.put("a.png", Bytes::from_static(b"a")).await.unwrap();
        fs::create_dir(storage.base_path().join("subdir"))
            .await
            .unwrap();

        assert_eq!(storage.list().await.unwrap(), ["a.png", "b.png"]);
    }

    #[tokio::test]
    async fn list_skips_in_progress_writes() {
        let (_dir, storage) = storage().await;
        storage.put("cat.png", Bytes::from_static(b"c")).await.unwrap();
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(storage.base_path())
            .unwrap();

        assert_eq!(storage.list().await.unwrap(), ["cat.png"]);
        drop(temp);
    }

    #[tokio::test]
    async fn list_without_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path().join("never-created"));
        assert!(storage.list().await.unwrap().is_empty());
    }
}
