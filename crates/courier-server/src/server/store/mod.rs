//! Persistence boundary for blog records.
//!
//! Handlers depend only on the [`BlogStore`] trait and receive an
//! implementation when the server is assembled. The crate ships
//! [`InMemoryBlogStore`]; any document database can be plugged in by
//! implementing the trait and mapping its failures onto [`StoreError`].

mod memory;

pub use memory::InMemoryBlogStore;

use courier_core::{Error, RecordId, proto::blog::Blog};
use futures::stream::BoxStream;
use tonic::Status;

/// A blog as it exists in persistence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlogRecord {
    pub id: RecordId,
    pub draft: BlogDraft,
}

/// The caller-supplied fields of a blog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlogDraft {
    pub author_id: String,
    pub title: String,
    pub content: String,
}

impl From<Blog> for BlogDraft {
    fn from(blog: Blog) -> Self {
        Self {
            author_id: blog.author_id,
            title: blog.title,
            content: blog.content,
        }
    }
}

impl From<BlogRecord> for Blog {
    fn from(record: BlogRecord) -> Self {
        Self {
            id: record.id.to_string(),
            author_id: record.draft.author_id,
            title: record.draft.title,
            content: record.draft.content,
        }
    }
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Blog {id} not found")]
    NotFound { id: RecordId },

    #[error("Store backend failure: {context}")]
    Backend { context: String },
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::not_found(err.to_string()),
            StoreError::Backend { context } => {
                Self::internal(format!("Store backend failure: {context}"))
            }
        }
    }
}

impl From<StoreError> for Status {
    fn from(err: StoreError) -> Self {
        Error::from(err).into()
    }
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[tonic::async_trait]
pub trait BlogStore: Send + Sync + 'static {
    /// Stores a new blog and returns its freshly assigned id.
    async fn insert(&self, draft: BlogDraft) -> StoreResult<RecordId>;

    async fn find_by_id(&self, id: &RecordId) -> StoreResult<BlogRecord>;

    /// Replaces every caller-supplied field of an existing blog.
    async fn replace(&self, id: &RecordId, draft: BlogDraft) -> StoreResult<BlogRecord>;

    /// Removes a blog and returns how many records were deleted.
    async fn delete(&self, id: &RecordId) -> StoreResult<u64>;

    /// Streams every stored blog. A failure partway through surfaces as an
    /// `Err` item and ends the listing.
    async fn list_all(&self) -> StoreResult<BoxStream<'static, StoreResult<BlogRecord>>>;
}
