//! Document storage for blog posts.
//!
//! [`DocumentStore`] is the seam between the blog handlers and a database.
//! [`MemoryStore`] keeps documents in process; writes are last-writer-wins.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use rand::Rng;
use tokio::sync::RwLock;

/// Identifier of a stored document: 12 bytes, written as 24 hex characters.
///
/// Laid out as a big-endian creation timestamp in seconds, five per-process
/// random bytes and a 24-bit counter, so ids created by one process sort in
/// creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generate a new id.
    pub fn new() -> Self {
        static PROCESS: OnceLock<[u8; 5]> = OnceLock::new();
        static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

        let process = PROCESS.get_or_init(|| rand::rng().random());
        let counter =
            COUNTER.get_or_init(|| AtomicU32::new(rand::rng().random_range(0..1 << 23)));

        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        let count = counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(process);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidId(s.to_string());
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

/// Stored fields of a blog post.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlogItem {
    pub author_id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot parse id: {0:?}")]
    InvalidId(String),
    #[error("cannot find blog with id {0}")]
    NotFound(ObjectId),
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Storage operations used by the blog service.
pub trait DocumentStore: Send + Sync + 'static {
    /// Insert `item` under a fresh id.
    fn create(&self, item: BlogItem) -> BoxFuture<'_, Result<ObjectId, StoreError>>;

    fn find(&self, id: ObjectId) -> BoxFuture<'_, Result<BlogItem, StoreError>>;

    /// Overwrite the document stored under `id`.
    fn replace(&self, id: ObjectId, item: BlogItem) -> BoxFuture<'_, Result<(), StoreError>>;

    fn delete(&self, id: ObjectId) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Every stored document, in id order.
    fn list(&self) -> BoxStream<'_, Result<(ObjectId, BlogItem), StoreError>>;
}

/// In-process [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<ObjectId, BlogItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn create(&self, item: BlogItem) -> BoxFuture<'_, Result<ObjectId, StoreError>> {
        Box::pin(async move {
            let mut documents = self.documents.write().await;
            let mut id = ObjectId::new();
            while documents.contains_key(&id) {
                id = ObjectId::new();
            }
            documents.insert(id, item);
            Ok(id)
        })
    }

    fn find(&self, id: ObjectId) -> BoxFuture<'_, Result<BlogItem, StoreError>> {
        Box::pin(async move {
            self.documents
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound(id))
        })
    }

    fn replace(&self, id: ObjectId, item: BlogItem) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            match self.documents.write().await.get_mut(&id) {
                Some(stored) => {
                    *stored = item;
                    Ok(())
                }
                None => Err(StoreError::NotFound(id)),
            }
        })
    }

    fn delete(&self, id: ObjectId) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.documents
                .write()
                .await
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound(id))
        })
    }

    fn list(&self) -> BoxStream<'_, Result<(ObjectId, BlogItem), StoreError>> {
        Box::pin(async_stream::stream! {
            let snapshot: Vec<(ObjectId, BlogItem)> = self
                .documents
                .read()
                .await
                .iter()
                .map(|(id, item)| (*id, item.clone()))
                .collect();
            for document in snapshot {
                yield Ok::<_, StoreError>(document);
            }
        })
    }
}
