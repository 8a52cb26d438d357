use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

mod fs;
mod types;

pub use fs::FsStorage;
pub use types::{ObjectMeta, StorageError};

/// A boxed stream of byte chunks for streaming reads
pub type ByteStream = Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send + Unpin>;

/// Flat store of uploaded image files, addressed by stored name.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Find a free stored name for `candidate`.
    /// Returns `candidate` itself if unused, otherwise the first free
    /// numbered variant (`name_1.ext`, `name_2.ext`, ...).
    /// Nothing is reserved on disk: a concurrent writer may take the same
    /// name before `put` runs.
    async fn free_name(&self, candidate: &str) -> Result<String, StorageError>;

    /// Store a whole file under `name`, replacing any existing file.
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError>;

    /// Get file data as a stream.
    async fn get(&self, name: &str) -> Result<ByteStream, StorageError>;

    /// Get file metadata without fetching data.
    async fn meta(&self, name: &str) -> Result<ObjectMeta, StorageError>;

    /// List the names of all stored files.
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}
