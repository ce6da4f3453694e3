//! Blog service demo over the in-memory document store.
//!
//! Run with: cargo run --bin blog
//!
//! Responses are printed as JSON.

use futures::StreamExt;
use streamrpc::Registry;
use streamrpc_examples::blog::*;
use streamrpc_examples::{SecuritySettings, connect};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let settings = SecuritySettings::from_env()?;
    let registry = BlogService::new(MemoryStore::new())
        .register(Registry::builder())
        .build()?;
    let server = settings.server(registry)?;
    let client = connect(&server, &settings);

    println!("=== Blog Service ===");

    let mut ids = Vec::new();
    for (title, content) in [
        ("First blog", "Content of the first blog"),
        ("Second blog", "Content of the second blog"),
    ] {
        let blog = Blog {
            id: String::new(),
            author_id: "newton".to_string(),
            title: title.to_string(),
            content: content.to_string(),
        };
        let res: CreateBlogResponse = client
            .call_unary(CREATE_BLOG, CreateBlogRequest { blog: Some(blog) })
            .await?;
        println!("Created: {}", serde_json::to_string(&res)?);
        if let Some(blog) = res.blog {
            ids.push(blog.id);
        }
    }

    let Some(first) = ids.first().cloned() else {
        anyhow::bail!("no blog was created");
    };

    let res: ReadBlogResponse = client
        .call_unary(
            READ_BLOG,
            ReadBlogRequest {
                blog_id: first.clone(),
            },
        )
        .await?;
    println!("Read: {}", serde_json::to_string_pretty(&res)?);

    let edited = Blog {
        id: first.clone(),
        author_id: "newton".to_string(),
        title: "First blog (edited)".to_string(),
        content: "Edited content of the first blog".to_string(),
    };
    let res: UpdateBlogResponse = client
        .call_unary(UPDATE_BLOG, UpdateBlogRequest { blog: Some(edited) })
        .await?;
    println!("Updated: {}", serde_json::to_string(&res)?);

    let mut listing = client
        .call_server_stream::<_, ListBlogResponse>(LIST_BLOG, ListBlogRequest {})
        .await?;
    while let Some(res) = listing.next().await {
        println!("Listed: {}", serde_json::to_string(&res?)?);
    }

    let res: DeleteBlogResponse = client
        .call_unary(
            DELETE_BLOG,
            DeleteBlogRequest {
                blog_id: first.clone(),
            },
        )
        .await?;
    println!("Deleted: {}", res.blog_id);

    for blog_id in [first, "not-an-id".to_string()] {
        let result = client
            .call_unary::<_, ReadBlogResponse>(READ_BLOG, ReadBlogRequest { blog_id: blog_id.clone() })
            .await;
        if let Err(status) = result {
            println!("Read {:?} failed: {}", blog_id, status);
        }
    }

    Ok(())
}
