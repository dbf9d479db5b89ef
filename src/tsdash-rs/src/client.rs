use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use tsdash_core::{
    ApiKey, Collection, CollectionImport, CollectionSchema, CollectionUpdate, ConnectionConfig,
    CreateKeyRequest, DeletedKey, ExportParams, HealthStatus, ImportAction, ImportLineResult,
    ImportSummary, KeyList, Metrics, MultiSearchRequest, MultiSearchResponse, SearchParams,
    SearchResult,
};

use crate::jsonl::{parse_jsonl, to_jsonl};
use crate::request::{ApiRequest, RequestBody, RequestOptions};
use crate::{ClientError, Result};

/// Header carrying the admin key on every call
pub const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// Budget for the reachability check run before a connection is saved
pub const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Typesense REST API client bound to one connection
#[derive(Debug, Clone)]
pub struct TypesenseClient {
    config: ConnectionConfig,
    base_url: String,
    client: HttpClient,
    options: RequestOptions,
}

impl TypesenseClient {
    /// Create a client with its own connection pool
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_http(HttpClient::new(), config, RequestOptions::default())
    }

    /// Create a client that shares an existing connection pool.
    ///
    /// No network I/O happens here.
    pub fn with_http(client: HttpClient, config: ConnectionConfig, options: RequestOptions) -> Self {
        Self {
            base_url: config.base_url(),
            config,
            client,
            options,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Issue `request` and decode the JSON response
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let body = self.execute_raw(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Issue `request` and return the response body as text.
    ///
    /// Non-2xx responses become [`ClientError::Server`]. Idempotent requests are
    /// retried on connect and timeout failures.
    pub async fn execute_raw(&self, request: ApiRequest) -> Result<String> {
        let url = request.url(&self.base_url)?;
        let mut attempt = 0;

        loop {
            tracing::debug!(method = %request.method, url = %url, attempt, "Calling Typesense");

            let mut builder = self
                .client
                .request(request.method.clone(), url.clone())
                .header(API_KEY_HEADER, &self.config.api_key)
                .timeout(self.options.timeout);

            builder = match &request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(body) => builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(serde_json::to_vec(body)?),
                RequestBody::Text(body) => builder
                    .header(CONTENT_TYPE, "text/plain")
                    .body(body.clone()),
            };

            match builder.send().await {
                Ok(response) => return read_body(response).await,
                Err(e)
                    if request.idempotent
                        && attempt < self.options.max_retries
                        && (e.is_connect() || e.is_timeout()) =>
                {
                    let delay = self.options.backoff(attempt);
                    tracing::warn!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure calling Typesense, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(method = %request.method, url = %url, "Typesense request failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Health check
    pub async fn health(&self) -> Result<HealthStatus> {
        self.execute(ApiRequest::get(&["health"])).await
    }

    /// Cluster metrics (CPU, memory, disk)
    pub async fn metrics(&self) -> Result<Metrics> {
        self.execute(ApiRequest::get(&["metrics.json"])).await
    }

    /// Request latency and throughput statistics
    pub async fn stats(&self) -> Result<Value> {
        self.execute(ApiRequest::get(&["stats.json"])).await
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.execute(ApiRequest::get(&["collections"])).await
    }

    pub async fn create_collection(&self, schema: &CollectionSchema) -> Result<Collection> {
        self.execute(ApiRequest::post(&["collections"]).json(schema)?)
            .await
    }

    pub async fn get_collection(&self, name: &str) -> Result<Collection> {
        self.execute(ApiRequest::get(&["collections", name])).await
    }

    /// Add or drop fields; the server echoes the applied update
    pub async fn update_collection(
        &self,
        name: &str,
        update: &CollectionUpdate,
    ) -> Result<CollectionUpdate> {
        self.execute(ApiRequest::patch(&["collections", name]).json(update)?)
            .await
    }

    pub async fn delete_collection(&self, name: &str) -> Result<Collection> {
        self.execute(ApiRequest::delete(&["collections", name]))
            .await
    }

    /// Index a new document; fails if its id already exists
    pub async fn index_document(&self, collection: &str, document: &Value) -> Result<Value> {
        self.execute(ApiRequest::post(&["collections", collection, "documents"]).json(document)?)
            .await
    }

    /// Create or replace a document
    pub async fn upsert_document(&self, collection: &str, document: &Value) -> Result<Value> {
        let request = ApiRequest::post(&["collections", collection, "documents"])
            .query("action", ImportAction::Upsert.as_str())
            .json(document)?
            .idempotent(true);
        self.execute(request).await
    }

    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Value> {
        self.execute(ApiRequest::get(&["collections", collection, "documents", id]))
            .await
    }

    /// Partially update a document
    pub async fn update_document(&self, collection: &str, id: &str, fields: &Value) -> Result<Value> {
        self.execute(ApiRequest::patch(&["collections", collection, "documents", id]).json(fields)?)
            .await
    }

    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<Value> {
        self.execute(ApiRequest::delete(&["collections", collection, "documents", id]))
            .await
    }

    /// Search documents
    pub async fn search(&self, collection: &str, params: &SearchParams) -> Result<SearchResult> {
        let request = ApiRequest::get(&["collections", collection, "documents", "search"])
            .queries(params.query_pairs());
        self.execute(request).await
    }

    /// Run several searches in one round trip
    pub async fn multi_search(&self, request: &MultiSearchRequest) -> Result<MultiSearchResponse> {
        self.execute(ApiRequest::post(&["multi_search"]).json(request)?.idempotent(true))
            .await
    }

    /// Export documents, one JSON value per line
    pub async fn export_documents(&self, collection: &str, params: &ExportParams) -> Result<Vec<Value>> {
        let request = ApiRequest::get(&["collections", collection, "documents", "export"])
            .queries(params.query_pairs());
        let body = self.execute_raw(request).await?;
        parse_jsonl(&body)
    }

    /// Bulk import documents as JSONL
    pub async fn import_documents(
        &self,
        collection: &str,
        documents: &[Value],
        action: ImportAction,
        batch_size: Option<usize>,
    ) -> Result<ImportSummary> {
        let mut request = ApiRequest::post(&["collections", collection, "documents", "import"])
            .query("action", action.as_str())
            .text(to_jsonl(documents)?)
            .idempotent(action != ImportAction::Create);
        if let Some(size) = batch_size {
            request = request.query("batch_size", size.to_string());
        }

        tracing::info!(collection, documents = documents.len(), action = action.as_str(), "Importing documents");
        let body = self.execute_raw(request).await?;
        let results: Vec<ImportLineResult> = parse_jsonl(&body)?;
        Ok(ImportSummary::from_results(results))
    }

    /// Create a collection and fill it from a JSONL payload.
    ///
    /// The payload is parsed before any network call, so a malformed line aborts
    /// everything. Not atomic: if the import partially fails, the collection
    /// stays created and the per-line failures are reported in the summary.
    pub async fn create_collection_with_jsonl(
        &self,
        schema: &CollectionSchema,
        payload: &str,
    ) -> Result<CollectionImport> {
        let documents: Vec<Value> = parse_jsonl(payload)?;

        let collection = self.create_collection(schema).await?;
        if collection.name != schema.name {
            return Err(ClientError::Logic(format!(
                "collection create returned {:?}, expected {:?}",
                collection.name, schema.name
            )));
        }

        let import = if documents.is_empty() {
            ImportSummary::from_results(Vec::new())
        } else {
            self.import_documents(&collection.name, &documents, ImportAction::Create, None)
                .await?
        };

        if !import.is_complete() {
            tracing::warn!(
                collection = %collection.name,
                failed = import.failed,
                succeeded = import.succeeded,
                "Import partially failed; collection was kept"
            );
        }

        Ok(CollectionImport { collection, import })
    }

    pub async fn list_keys(&self) -> Result<KeyList> {
        self.execute(ApiRequest::get(&["keys"])).await
    }

    /// Create an API key; the full value is only present in this response
    pub async fn create_key(&self, request: &CreateKeyRequest) -> Result<ApiKey> {
        self.execute(ApiRequest::post(&["keys"]).json(request)?)
            .await
    }

    pub async fn delete_key(&self, id: u64) -> Result<DeletedKey> {
        let id = id.to_string();
        self.execute(ApiRequest::delete(&["keys", id.as_str()]))
            .await
    }
}

/// Check that `config` reaches a healthy server.
///
/// Single attempt with [`CONNECTION_TEST_TIMEOUT`], on a shared pool.
pub async fn test_connection(client: &HttpClient, config: &ConnectionConfig) -> Result<HealthStatus> {
    let options = RequestOptions {
        timeout: CONNECTION_TEST_TIMEOUT,
        max_retries: 0,
        ..RequestOptions::default()
    };
    let health = TypesenseClient::with_http(client.clone(), config.clone(), options)
        .health()
        .await?;
    tracing::info!(host = %config.host, port = config.port, ok = health.ok, "Connection test finished");
    Ok(health)
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(ClientError::Server {
            status: status.as_u16(),
            message: error_message(&text, status.canonical_reason()),
        });
    }

    Ok(text)
}

/// Typesense errors look like `{"message": "..."}`; anything else is passed through
fn error_message(body: &str, reason: Option<&str>) -> String {
    let from_json = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => reason.unwrap_or("no response body").to_string(),
        None => body.trim().to_string(),
    }
}
