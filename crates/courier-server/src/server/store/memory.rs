use super::{BlogDraft, BlogRecord, BlogStore, StoreError, StoreResult};
use courier_core::RecordId;
use futures::{StreamExt, stream::BoxStream};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Process-local store. Records are kept in id order, which follows
/// creation time at millisecond granularity.
#[derive(Debug, Default)]
pub struct InMemoryBlogStore {
    records: RwLock<BTreeMap<RecordId, BlogDraft>>,
}

impl InMemoryBlogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[tonic::async_trait]
impl BlogStore for InMemoryBlogStore {
    async fn insert(&self, draft: BlogDraft) -> StoreResult<RecordId> {
        let mut records = self.records.write();
        // Two ids minted in the same millisecond share a timestamp; retry on
        // the astronomically unlikely random collision.
        let id = loop {
            let id = RecordId::generate();
            if !records.contains_key(&id) {
                break id;
            }
        };
        records.insert(id, draft);
        Ok(id)
    }

    async fn find_by_id(&self, id: &RecordId) -> StoreResult<BlogRecord> {
        self.records
            .read()
            .get(id)
            .map(|draft| BlogRecord {
                id: *id,
                draft: draft.clone(),
            })
            .ok_or(StoreError::NotFound { id: *id })
    }

    async fn replace(&self, id: &RecordId, draft: BlogDraft) -> StoreResult<BlogRecord> {
        let mut records = self.records.write();
        let slot = records.get_mut(id).ok_or(StoreError::NotFound { id: *id })?;
        slot.clone_from(&draft);
        Ok(BlogRecord { id: *id, draft })
    }

    async fn delete(&self, id: &RecordId) -> StoreResult<u64> {
        Ok(u64::from(self.records.write().remove(id).is_some()))
    }

    async fn list_all(&self) -> StoreResult<BoxStream<'static, StoreResult<BlogRecord>>> {
        let snapshot: Vec<_> = self
            .records
            .read()
            .iter()
            .map(|(id, draft)| {
                Ok(BlogRecord {
                    id: *id,
                    draft: draft.clone(),
                })
            })
            .collect();
        Ok(futures::stream::iter(snapshot).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn draft(title: &str) -> BlogDraft {
        BlogDraft {
            author_id: String::from("stephane"),
            title: String::from(title),
            content: String::from("content"),
        }
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = InMemoryBlogStore::new();
        let id = store.insert(draft("first")).await.unwrap();

        let found = store.find_by_id(&id).await.unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.draft, draft("first"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let store = InMemoryBlogStore::new();
        let id = RecordId::generate();

        assert_eq!(
            store.find_by_id(&id).await,
            Err(StoreError::NotFound { id })
        );
        assert_eq!(
            store.replace(&id, draft("x")).await,
            Err(StoreError::NotFound { id })
        );
        assert_eq!(store.delete(&id).await, Ok(0));
    }

    #[tokio::test]
    async fn replace_overwrites_every_field() {
        let store = InMemoryBlogStore::new();
        let id = store.insert(draft("before")).await.unwrap();

        let updated = BlogDraft {
            author_id: String::from("someone else"),
            title: String::from("after"),
            content: String::new(),
        };
        let record = store.replace(&id, updated.clone()).await.unwrap();
        assert_eq!(record.draft, updated);
        assert_eq!(store.find_by_id(&id).await.unwrap().draft, updated);
    }

    #[tokio::test]
    async fn delete_counts_removed_records() {
        let store = InMemoryBlogStore::new();
        let id = store.insert(draft("doomed")).await.unwrap();

        assert_eq!(store.delete(&id).await, Ok(1));
        assert_eq!(store.delete(&id).await, Ok(0));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn listing_is_a_snapshot_in_id_order() {
        let store = InMemoryBlogStore::new();
        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            ids.push(store.insert(draft(title)).await.unwrap());
        }

        let listing = store.list_all().await.unwrap();
        store.insert(draft("late")).await.unwrap();

        let listed: Vec<_> = listing.map_ok(|r| r.id).try_collect().await.unwrap();
        ids.sort();
        assert_eq!(listed, ids);
    }
}
