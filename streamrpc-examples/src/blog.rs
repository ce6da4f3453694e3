//! Blog service: CRUD and listing over a [`DocumentStore`].

use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use streamrpc::RegistryBuilder;
use streamrpc::core::{CallContext, Sender, Status};

mod store;

pub use store::{BlogItem, DocumentStore, MemoryStore, ObjectId, StoreError};

pub const CREATE_BLOG: &str = "blog.BlogService/CreateBlog";
pub const READ_BLOG: &str = "blog.BlogService/ReadBlog";
pub const UPDATE_BLOG: &str = "blog.BlogService/UpdateBlog";
pub const DELETE_BLOG: &str = "blog.BlogService/DeleteBlog";
pub const LIST_BLOG: &str = "blog.BlogService/ListBlog";

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Blog {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub author_id: String,
    #[prost(string, tag = "3")]
    pub title: String,
    #[prost(string, tag = "4")]
    pub content: String,
}

impl Blog {
    fn from_item(id: ObjectId, item: BlogItem) -> Self {
        Self {
            id: id.to_string(),
            author_id: item.author_id,
            title: item.title,
            content: item.content,
        }
    }

    fn into_item(self) -> BlogItem {
        BlogItem {
            author_id: self.author_id,
            title: self.title,
            content: self.content,
        }
    }
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct CreateBlogRequest {
    #[prost(message, optional, tag = "1")]
    pub blog: Option<Blog>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct CreateBlogResponse {
    #[prost(message, optional, tag = "1")]
    pub blog: Option<Blog>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct ReadBlogRequest {
    #[prost(string, tag = "1")]
    pub blog_id: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct ReadBlogResponse {
    #[prost(message, optional, tag = "1")]
    pub blog: Option<Blog>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct UpdateBlogRequest {
    #[prost(message, optional, tag = "1")]
    pub blog: Option<Blog>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct UpdateBlogResponse {
    #[prost(message, optional, tag = "1")]
    pub blog: Option<Blog>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct DeleteBlogRequest {
    #[prost(string, tag = "1")]
    pub blog_id: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct DeleteBlogResponse {
    #[prost(string, tag = "1")]
    pub blog_id: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct ListBlogRequest {}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct ListBlogResponse {
    #[prost(message, optional, tag = "1")]
    pub blog: Option<Blog>,
}

impl From<StoreError> for Status {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::InvalidId(_) => Status::invalid_argument(err.to_string()),
            StoreError::NotFound(_) => Status::not_found(err.to_string()),
            StoreError::Backend(_) => {
                tracing::warn!(error = %err, "blog store failed");
                Status::internal(format!("internal error: {}", err))
            }
        }
    }
}

/// Blog service backed by `store`.
#[derive(Clone)]
pub struct BlogService {
    store: Arc<dyn DocumentStore>,
}

impl BlogService {
    pub fn new(store: impl DocumentStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Add the blog operations to `builder`.
    pub fn register(self, builder: RegistryBuilder) -> RegistryBuilder {
        let create = self.clone();
        let read = self.clone();
        let update = self.clone();
        let delete = self.clone();
        let list = self;
        builder
            .unary(CREATE_BLOG, move |req: CreateBlogRequest, _ctx: CallContext| {
                let service = create.clone();
                async move { service.create_blog(req).await }
            })
            .unary(READ_BLOG, move |req: ReadBlogRequest, _ctx: CallContext| {
                let service = read.clone();
                async move { service.read_blog(req).await }
            })
            .unary(UPDATE_BLOG, move |req: UpdateBlogRequest, _ctx: CallContext| {
                let service = update.clone();
                async move { service.update_blog(req).await }
            })
            .unary(DELETE_BLOG, move |req: DeleteBlogRequest, _ctx: CallContext| {
                let service = delete.clone();
                async move { service.delete_blog(req).await }
            })
            .server_streaming(
                LIST_BLOG,
                move |req: ListBlogRequest, ctx: CallContext, tx: Sender<ListBlogResponse>| {
                    let service = list.clone();
                    async move { service.list_blog(req, ctx, tx).await }
                },
            )
    }

    pub async fn create_blog(&self, req: CreateBlogRequest) -> Result<CreateBlogResponse, Status> {
        tracing::info!(?req, "CreateBlog invoked");
        let blog = req
            .blog
            .ok_or_else(|| Status::invalid_argument("missing blog"))?;
        let item = blog.into_item();
        let id = self.store.create(item.clone()).await?;
        Ok(CreateBlogResponse {
            blog: Some(Blog::from_item(id, item)),
        })
    }

    pub async fn read_blog(&self, req: ReadBlogRequest) -> Result<ReadBlogResponse, Status> {
        tracing::info!(?req, "ReadBlog invoked");
        let id: ObjectId = req.blog_id.parse()?;
        let item = self.store.find(id).await?;
        Ok(ReadBlogResponse {
            blog: Some(Blog::from_item(id, item)),
        })
    }

    pub async fn update_blog(&self, req: UpdateBlogRequest) -> Result<UpdateBlogResponse, Status> {
        tracing::info!(?req, "UpdateBlog invoked");
        let blog = req
            .blog
            .ok_or_else(|| Status::invalid_argument("missing blog"))?;
        let id: ObjectId = blog.id.parse()?;
        let item = blog.into_item();
        self.store.replace(id, item.clone()).await?;
        Ok(UpdateBlogResponse {
            blog: Some(Blog::from_item(id, item)),
        })
    }

    pub async fn delete_blog(&self, req: DeleteBlogRequest) -> Result<DeleteBlogResponse, Status> {
        tracing::info!(?req, "DeleteBlog invoked");
        let id: ObjectId = req.blog_id.parse()?;
        self.store.delete(id).await?;
        Ok(DeleteBlogResponse {
            blog_id: id.to_string(),
        })
    }

    pub async fn list_blog(
        &self,
        _req: ListBlogRequest,
        ctx: CallContext,
        tx: Sender<ListBlogResponse>,
    ) -> Result<(), Status> {
        tracing::info!("ListBlog invoked");
        let mut documents = self.store.list();
        while let Some(document) = documents.next().await {
            ctx.check()?;
            let (id, item) = document?;
            tx.send(ListBlogResponse {
                blog: Some(Blog::from_item(id, item)),
            })
            .await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlogService").finish_non_exhaustive()
    }
}
