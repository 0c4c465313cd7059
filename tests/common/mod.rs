use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use blog_api::routes::{app, AppState};
use blog_api::store::memory::MemoryStore;

/// Router wired to a fresh in-memory store. Every test gets its own
/// isolated universe; the store handle allows out-of-band setup (admin
/// flags, deactivation) that has no HTTP surface.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let router = app(AppState { store: store.clone() });
    TestApp { router, store }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .context("build request")?;

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("dispatch request")?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .context("read body")?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("parse body as JSON")?
        };
        Ok((status, value))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<(StatusCode, Value)> {
        self.request(Method::PUT, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.request(Method::DELETE, path, token, None).await
    }

    /// Register a user and return `(token, user id)`.
    pub async fn register(&self, tag: &str) -> Result<(String, String)> {
        let (status, body) = self
            .post("/api/auth/register", None, register_payload(tag))
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {body}");
        let token = body["data"]["token"]
            .as_str()
            .context("token missing")?
            .to_string();
        let id = body["data"]["user"]["id"]
            .as_str()
            .context("user id missing")?
            .to_string();
        Ok((token, id))
    }

    /// Create a post and return its id.
    pub async fn create_post(&self, token: &str, title: &str, published: bool) -> Result<String> {
        let (status, body) = self
            .post(
                "/api/posts",
                Some(token),
                json!({ "title": title, "content": format!("{title} content"), "published": published }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create post failed: {body}");
        Ok(body["data"]["id"].as_str().context("post id missing")?.to_string())
    }

    /// Create a comment and return its id.
    pub async fn create_comment(
        &self,
        token: &str,
        post_id: &str,
        parent_id: Option<&str>,
        content: &str,
    ) -> Result<String> {
        let mut payload = json!({ "content": content, "postId": post_id });
        if let Some(parent_id) = parent_id {
            payload["parentId"] = json!(parent_id);
        }
        let (status, body) = self.post("/api/comments", Some(token), payload).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create comment failed: {body}");
        Ok(body["data"]["id"].as_str().context("comment id missing")?.to_string())
    }
}

pub fn register_payload(tag: &str) -> Value {
    json!({
        "email": format!("{tag}@example.com"),
        "username": tag,
        "firstName": "Test",
        "lastName": "User",
        "password": "secret123",
        "confirmPassword": "secret123"
    })
}

/// Field names present in a validation `errors` array.
pub fn error_fields(body: &Value) -> Vec<String> {
    body["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
