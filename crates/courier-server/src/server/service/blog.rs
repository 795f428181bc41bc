//! CRUD over the injected [`BlogStore`].
//!
//! Ids arrive as Crockford Base32 strings. One that fails to decode is the
//! caller's mistake (`INVALID_ARGUMENT`), while a well-formed id with no
//! record behind it is `NOT_FOUND`. Store failures become `INTERNAL`.

use super::observed;
use crate::server::{
    config::ServerConfig,
    lifecycle::CallTracker,
    store::{BlogDraft, BlogRecord, BlogStore, StoreError},
    streaming::{ResponseStream, spawn_producer},
};
use courier_core::{
    Deadline, Error, RecordId,
    proto::blog::{
        Blog, CreateBlogRequest, CreateBlogResponse, DeleteBlogRequest, DeleteBlogResponse,
        ListBlogRequest, ListBlogResponse, ReadBlogRequest, ReadBlogResponse, UpdateBlogRequest,
        UpdateBlogResponse, blog_service_server::BlogService,
    },
};
use futures::StreamExt;
use std::sync::Arc;
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct BlogHandler {
    store: Arc<dyn BlogStore>,
    config: ServerConfig,
    tracker: Arc<CallTracker>,
}

impl BlogHandler {
    #[must_use]
    pub fn new(store: Arc<dyn BlogStore>, config: ServerConfig, tracker: Arc<CallTracker>) -> Self {
        Self {
            store,
            config,
            tracker,
        }
    }
}

fn required_blog(blog: Option<Blog>) -> Result<Blog, Error> {
    blog.ok_or_else(|| Error::invalid_argument("A blog is required"))
}

#[tonic::async_trait]
impl BlogService for BlogHandler {
    type ListBlogStream = ResponseStream<ListBlogResponse>;

    #[tracing::instrument(skip_all)]
    async fn create_blog(
        &self,
        req: Request<CreateBlogRequest>,
    ) -> Result<Response<CreateBlogResponse>, Status> {
        observed("CreateBlog", async move {
            let draft = BlogDraft::from(required_blog(req.into_inner().blog)?);
            let id = self.store.insert(draft.clone()).await?;
            tracing::info!(%id, "Created blog");

            let blog = Blog::from(BlogRecord { id, draft });
            Ok(Response::new(CreateBlogResponse { blog: Some(blog) }))
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(id = %req.get_ref().id))]
    async fn read_blog(
        &self,
        req: Request<ReadBlogRequest>,
    ) -> Result<Response<ReadBlogResponse>, Status> {
        observed("ReadBlog", async move {
            let id = RecordId::parse(&req.get_ref().id)?;
            let record = self.store.find_by_id(&id).await?;
            Ok(Response::new(ReadBlogResponse {
                blog: Some(record.into()),
            }))
        })
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn update_blog(
        &self,
        req: Request<UpdateBlogRequest>,
    ) -> Result<Response<UpdateBlogResponse>, Status> {
        observed("UpdateBlog", async move {
            let blog = required_blog(req.into_inner().blog)?;
            let id = RecordId::parse(&blog.id)?;
            let record = self.store.replace(&id, BlogDraft::from(blog)).await?;
            tracing::info!(%id, "Updated blog");
            Ok(Response::new(UpdateBlogResponse {
                blog: Some(record.into()),
            }))
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(id = %req.get_ref().blog_id))]
    async fn delete_blog(
        &self,
        req: Request<DeleteBlogRequest>,
    ) -> Result<Response<DeleteBlogResponse>, Status> {
        observed("DeleteBlog", async move {
            let id = RecordId::parse(&req.get_ref().blog_id)?;
            let deleted = self.store.delete(&id).await?;
            if deleted == 0 {
                return Err(StoreError::NotFound { id }.into());
            }
            tracing::info!(%id, "Deleted blog");
            Ok(Response::new(DeleteBlogResponse {
                blog_id: id.to_string(),
            }))
        })
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn list_blog(
        &self,
        req: Request<ListBlogRequest>,
    ) -> Result<Response<Self::ListBlogStream>, Status> {
        observed("ListBlog", async move {
            let deadline = Deadline::from_metadata(req.metadata());
            let guard = self.tracker.begin("ListBlog")?;
            let mut records = self.store.list_all().await?;

            let stream = spawn_producer(
                guard,
                self.config.stream_buffer_size,
                deadline,
                move |emitter| async move {
                    while let Some(record) = emitter.watch(records.next()).await? {
                        let blog = Blog::from(record?);
                        emitter.emit(ListBlogResponse { blog: Some(blog) }).await?;
                    }
                    Ok(())
                },
            );

            Ok(Response::new(Box::pin(stream) as Self::ListBlogStream))
        })
        .await
    }
}
