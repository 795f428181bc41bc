use crate::{
    call::{CallContext, server_stream::ServerStreamReceiver, unary},
    service::accepting,
};
use courier_core::{
    Error, Result,
    proto::blog::{
        Blog, CreateBlogRequest, DeleteBlogRequest, ListBlogRequest, ListBlogResponse,
        ReadBlogRequest, UpdateBlogRequest, blog_service_client::BlogServiceClient,
    },
};
use tonic::transport::Channel;

#[derive(Clone, Debug)]
pub struct BlogCaller {
    client: BlogServiceClient<Channel>,
}

/// Every blog response wraps an optional `Blog`; absence is a server bug.
fn required(blog: Option<Blog>) -> Result<Blog> {
    blog.ok_or_else(|| Error::internal("Server response is missing the blog"))
}

impl BlogCaller {
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            client: accepting!(BlogServiceClient::new(channel)),
        }
    }

    /// Creates a blog, returning it with its assigned id. Any id on `blog`
    /// is ignored.
    ///
    /// # Errors
    ///
    /// `INTERNAL` when the store fails.
    pub async fn create(&self, ctx: &CallContext, blog: Blog) -> Result<Blog> {
        let mut client = self.client.clone();
        let req = ctx.request(CreateBlogRequest { blog: Some(blog) });
        required(unary::invoke(ctx, client.create_blog(req)).await?.blog)
    }

    /// # Errors
    ///
    /// `INVALID_ARGUMENT` for a malformed id, `NOT_FOUND` for an unknown one.
    pub async fn read(&self, ctx: &CallContext, id: &str) -> Result<Blog> {
        let mut client = self.client.clone();
        let req = ctx.request(ReadBlogRequest { id: id.to_owned() });
        required(unary::invoke(ctx, client.read_blog(req)).await?.blog)
    }

    /// Replaces every field of the blog identified by `blog.id`.
    ///
    /// # Errors
    ///
    /// Same as [`BlogCaller::read`].
    pub async fn update(&self, ctx: &CallContext, blog: Blog) -> Result<Blog> {
        let mut client = self.client.clone();
        let req = ctx.request(UpdateBlogRequest { blog: Some(blog) });
        required(unary::invoke(ctx, client.update_blog(req)).await?.blog)
    }

    /// Deletes a blog, returning its id.
    ///
    /// # Errors
    ///
    /// Same as [`BlogCaller::read`]; deleting twice is `NOT_FOUND`.
    pub async fn delete(&self, ctx: &CallContext, id: &str) -> Result<String> {
        let mut client = self.client.clone();
        let req = ctx.request(DeleteBlogRequest {
            blog_id: id.to_owned(),
        });
        Ok(unary::invoke(ctx, client.delete_blog(req)).await?.blog_id)
    }

    /// # Errors
    ///
    /// The context's abort error if the stream cannot be opened in time.
    pub async fn list(&self, ctx: CallContext) -> Result<ServerStreamReceiver<ListBlogResponse>> {
        let mut client = self.client.clone();
        let req = ctx.request(ListBlogRequest {});
        ServerStreamReceiver::open(ctx, client.list_blog(req)).await
    }

    /// Collects every stored blog.
    ///
    /// # Errors
    ///
    /// Same as [`BlogCaller::list`], plus any mid-stream failure.
    pub async fn list_all(&self, ctx: CallContext) -> Result<Vec<Blog>> {
        let mut stream = self.list(ctx).await?;
        let mut blogs = Vec::new();
        while let Some(res) = stream.next().await? {
            blogs.push(required(res.blog)?);
        }
        Ok(blogs)
    }
}
