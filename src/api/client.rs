use futures::future::BoxFuture;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::models::{Conversation, Message, Participant};
use crate::error::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;

/// REST surface the chat view-models depend on.
pub trait ChatApi: Send + Sync {
    fn groups(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>>;
    fn group_messages<'a>(&'a self, group_id: &'a str, limit: u32) -> BoxFuture<'a, ApiResult<Vec<Message>>>;
    fn group_participants<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, ApiResult<Vec<Participant>>>;
    /// The stored message arrives later as a `groupMessage` push, not in this response.
    fn send_group_message<'a>(&'a self, group_id: &'a str, text: &'a str) -> BoxFuture<'a, ApiResult<()>>;
    fn mark_group_read<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, ApiResult<()>>;
    fn dealer_chats(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>>;
    fn dealer_chat_messages<'a>(&'a self, chat_id: &'a str, limit: u32) -> BoxFuture<'a, ApiResult<Vec<Message>>>;
}

pub struct ApiClient {
    pub http: HttpClient,
    base_api: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_api: crate::utils::base_api(&crate::utils::normalize_url(base_url)),
            token,
        }
    }

    fn with_auth(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(t) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", t));
        }
        req
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_api, path.trim_start_matches('/'))
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Vec<T>> {
        let endpoint = self.endpoint(path);
        log::debug!("GET {endpoint}");
        let resp = self.with_auth(self.http.get(&endpoint)).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        let json: Value = resp.json().await?;
        decode_list(json)
    }

    async fn post(&self, path: &str, body: Value) -> ApiResult<()> {
        let endpoint = self.endpoint(path);
        log::debug!("POST {endpoint}");
        let resp = self.with_auth(self.http.post(&endpoint)).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Lists come back bare or wrapped in `data` / `items`.
fn decode_list<T: DeserializeOwned>(json: Value) -> ApiResult<Vec<T>> {
    let items = match json {
        Value::Array(arr) => arr,
        Value::Object(mut obj) => match obj.remove("data").or_else(|| obj.remove("items")) {
            Some(Value::Array(arr)) => arr,
            _ => return Err(ApiError::Decode("expected a list".into())),
        },
        _ => return Err(ApiError::Decode("expected a list".into())),
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<T>(item) {
            Ok(v) => out.push(v),
            Err(e) => log::warn!("Skipping malformed list entry: {e}"),
        }
    }
    Ok(out)
}

impl ChatApi for ApiClient {
    fn groups(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>> {
        Box::pin(self.get_list("groups"))
    }

    fn group_messages<'a>(&'a self, group_id: &'a str, limit: u32) -> BoxFuture<'a, ApiResult<Vec<Message>>> {
        Box::pin(async move { self.get_list(&format!("groups/{group_id}/messages?limit={limit}")).await })
    }

    fn group_participants<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, ApiResult<Vec<Participant>>> {
        Box::pin(async move { self.get_list(&format!("groups/{group_id}/participants")).await })
    }

    fn send_group_message<'a>(&'a self, group_id: &'a str, text: &'a str) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            self.post(&format!("groups/{group_id}/messages"), serde_json::json!({ "text": text })).await
        })
    }

    fn mark_group_read<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move { self.post(&format!("groups/{group_id}/read"), Value::Null).await })
    }

    fn dealer_chats(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>> {
        Box::pin(self.get_list("chats"))
    }

    fn dealer_chat_messages<'a>(&'a self, chat_id: &'a str, limit: u32) -> BoxFuture<'a, ApiResult<Vec<Message>>> {
        Box::pin(async move { self.get_list(&format!("chats/{chat_id}/messages?limit={limit}")).await })
    }
}
