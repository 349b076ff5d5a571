use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Header carrying the client-chosen idempotency key.
pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub version: u64,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl GroupEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn parameter(mut self, key: &str, value: &str) -> Self {
        self.parameters.push(Parameter {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.push(Label {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigGroup {
    pub name: String,
    pub version: u64,
    #[serde(default)]
    pub configs: Vec<GroupEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupVersions {
    pub name: String,
    pub versions: Vec<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl ClientError {
    /// HTTP status of an API error, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct RegistryClient {
    client: Client,
    base_url: String,
    idempotency_key: Option<String>,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            idempotency_key: None,
        }
    }

    /// Attach `key` to every POST sent through the returned client.
    pub fn with_idempotency_key(&self, key: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            idempotency_key: Some(key.to_string()),
        }
    }

    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        self.send(self.request(Method::GET, "/health")).await
    }

    pub async fn list_configs(&self) -> Result<Vec<Config>, ClientError> {
        self.send(self.request(Method::GET, "/configs")).await
    }

    pub async fn create_config(&self, config: &Config) -> Result<Config, ClientError> {
        self.send(self.request(Method::POST, "/configs").json(config)).await
    }

    pub async fn get_config(&self, name: &str, version: u64) -> Result<Config, ClientError> {
        let path = format!("/configs/{}/{}", name, version);
        self.send(self.request(Method::GET, &path)).await
    }

    pub async fn delete_config(&self, name: &str, version: u64) -> Result<(), ClientError> {
        let path = format!("/configs/{}/{}", name, version);
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    pub async fn list_groups(&self) -> Result<Vec<ConfigGroup>, ClientError> {
        self.send(self.request(Method::GET, "/groups")).await
    }

    pub async fn create_group(&self, group: &ConfigGroup) -> Result<ConfigGroup, ClientError> {
        self.send(self.request(Method::POST, "/groups").json(group)).await
    }

    pub async fn group_versions(&self, name: &str) -> Result<GroupVersions, ClientError> {
        let path = format!("/groups/{}", name);
        self.send(self.request(Method::GET, &path)).await
    }

    pub async fn get_group(&self, name: &str, version: u64) -> Result<ConfigGroup, ClientError> {
        let path = format!("/groups/{}/{}", name, version);
        self.send(self.request(Method::GET, &path)).await
    }

    pub async fn delete_group(&self, name: &str, version: u64) -> Result<(), ClientError> {
        let path = format!("/groups/{}/{}", name, version);
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    /// Publish a new group version with `entry` appended.
    pub async fn add_entry(
        &self,
        group: &str,
        version: u64,
        entry: &GroupEntry,
    ) -> Result<ConfigGroup, ClientError> {
        let path = format!("/groups/{}/{}/configs", group, version);
        self.send(self.request(Method::POST, &path).json(entry)).await
    }

    pub async fn get_entry(
        &self,
        group: &str,
        version: u64,
        entry: &str,
    ) -> Result<GroupEntry, ClientError> {
        let path = format!("/groups/{}/{}/configs/{}", group, version, entry);
        self.send(self.request(Method::GET, &path)).await
    }

    /// Publish a new group version without the named entry.
    pub async fn remove_entry(
        &self,
        group: &str,
        version: u64,
        entry: &str,
    ) -> Result<ConfigGroup, ClientError> {
        let path = format!("/groups/{}/{}/configs/{}", group, version, entry);
        self.send(self.request(Method::DELETE, &path)).await
    }

    /// Entries carrying every `key:value` pair in `labels` (`k1:v1;k2:v2`).
    pub async fn filter_entries(
        &self,
        group: &str,
        version: u64,
        labels: &str,
    ) -> Result<Vec<GroupEntry>, ClientError> {
        let path = format!("/groups/{}/{}/configs", group, version);
        let request = self.request(Method::GET, &path).query(&[("labels", labels)]);
        self.send(request).await
    }

    /// Publish a new group version without the entries matching `labels`.
    pub async fn remove_entries_by_labels(
        &self,
        group: &str,
        version: u64,
        labels: &str,
    ) -> Result<ConfigGroup, ClientError> {
        let path = format!("/groups/{}/{}/configs", group, version);
        let request = self.request(Method::DELETE, &path).query(&[("labels", labels)]);
        self.send(request).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let is_post = method == Method::POST;
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match (&self.idempotency_key, is_post) {
            (Some(key), true) => builder.header(IDEMPOTENCY_KEY, key),
            _ => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let resp = check(request.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        check(request.send().await?).await?;
        Ok(())
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) => text,
    };
    Err(ClientError::Api { status, message })
}
