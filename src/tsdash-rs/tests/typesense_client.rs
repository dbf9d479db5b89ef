//! Request shaping and response handling against a mocked Typesense server.

use serde_json::{json, Value};
use std::time::Duration;
use tsdash_core::{
    CollectionSchema, ConnectionConfig, ExportParams, Field, ImportAction, MultiSearchQuery,
    MultiSearchRequest, Protocol, SearchParams,
};
use tsdash_rs::{ClientError, ErrorKind, RequestOptions, TypesenseClient};
use wiremock::matchers::{any, body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "xyz";

fn config_for(server: &MockServer) -> ConnectionConfig {
    ConnectionConfig {
        host: "127.0.0.1".to_string(),
        port: server.address().port(),
        protocol: Protocol::Http,
        api_key: API_KEY.to_string(),
    }
}

fn client_for(server: &MockServer) -> TypesenseClient {
    TypesenseClient::new(config_for(server))
}

fn books_schema() -> CollectionSchema {
    CollectionSchema::new("books", vec![Field::new("title", "string")])
}

fn books_collection() -> Value {
    json!({
        "name": "books",
        "num_documents": 0,
        "created_at": 1700000000,
        "fields": [{"name": "title", "type": "string", "facet": false}]
    })
}

#[tokio::test]
async fn test_search_sends_key_and_encoded_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/books/documents/search"))
        .and(header("X-TYPESENSE-API-KEY", API_KEY))
        .and(query_param("q", "dune & co"))
        .and(query_param("query_by", "title"))
        .and(query_param("filter_by", "year:>1960 && rating:>=4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "found": 1,
            "out_of": 3,
            "page": 1,
            "search_time_ms": 0,
            "hits": [{"document": {"id": "0", "title": "Dune"}, "highlights": []}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = SearchParams::new("dune & co", "title").filter_by("year:>1960 && rating:>=4");
    let result = client_for(&server).search("books", &params).await.unwrap();

    assert_eq!(result.found, 1);
    assert_eq!(result.hits[0].document["title"], "Dune");
}

#[tokio::test]
async fn test_search_missing_collection_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/nope/documents/search"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found."})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .search("nope", &SearchParams::new("foo", "title"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.kind(), ErrorKind::Status(404));
    assert!(err.to_string().contains("404"), "{}", err);
    assert!(err.to_string().contains("Not found."), "{}", err);
}

#[tokio::test]
async fn test_malformed_success_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[{\"name\":"))
        .mount(&server)
        .await;

    let err = client_for(&server).list_collections().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn test_collection_crud_verbs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "books", "fields": [{"name": "title", "type": "string"}]})))
        .respond_with(ResponseTemplate::new(201).set_body_json(books_collection()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/collections/books"))
        .and(body_json(json!({"fields": [{"name": "year", "type": "int32"}]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"fields": [{"name": "year", "type": "int32"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/collections/books"))
        .respond_with(ResponseTemplate::new(200).set_body_json(books_collection()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let created = client.create_collection(&books_schema()).await.unwrap();
    assert_eq!(created.name, "books");

    let update = tsdash_core::CollectionUpdate {
        fields: vec![Field::new("year", "int32")],
    };
    let applied = client.update_collection("books", &update).await.unwrap();
    assert_eq!(applied, update);

    let deleted = client.delete_collection("books").await.unwrap();
    assert_eq!(deleted.name, "books");
}

#[tokio::test]
async fn test_document_operations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/books/documents"))
        .and(query_param("action", "upsert"))
        .and(body_json(json!({"id": "1", "title": "Dune"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1", "title": "Dune"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/collections/books/documents/1"))
        .and(body_json(json!({"title": "Dune Messiah"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "1", "title": "Dune Messiah"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/books/documents/a%2Fb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a/b"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .upsert_document("books", &json!({"id": "1", "title": "Dune"}))
        .await
        .unwrap();
    let updated = client
        .update_document("books", "1", &json!({"title": "Dune Messiah"}))
        .await
        .unwrap();
    assert_eq!(updated["title"], "Dune Messiah");

    let doc = client.get_document("books", "a/b").await.unwrap();
    assert_eq!(doc["id"], "a/b");
}

#[tokio::test]
async fn test_multi_search_posts_searches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/multi_search"))
        .and(body_json(json!({
            "searches": [
                {"collection": "books", "q": "dune", "query_by": "title"},
                {"collection": "authors", "q": "herbert", "query_by": "name"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"found": 1, "hits": []}, {"error": "Not found.", "code": 404}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = MultiSearchRequest {
        searches: vec![
            MultiSearchQuery {
                collection: "books".to_string(),
                params: SearchParams::new("dune", "title"),
            },
            MultiSearchQuery {
                collection: "authors".to_string(),
                params: SearchParams::new("herbert", "name"),
            },
        ],
    };
    let response = client_for(&server).multi_search(&request).await.unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[1]["code"], 404);
}

#[tokio::test]
async fn test_export_parses_jsonl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/books/documents/export"))
        .and(query_param("filter_by", "year:<2000"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"id\":\"1\",\"title\":\"Dune\"}\n{\"id\":\"2\",\"title\":\"Emma\"}"),
        )
        .mount(&server)
        .await;

    let params = ExportParams {
        filter_by: Some("year:<2000".to_string()),
        ..Default::default()
    };
    let docs = client_for(&server).export_documents("books", &params).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[1]["title"], "Emma");
}

#[tokio::test]
async fn test_import_sends_jsonl_with_action_and_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/books/documents/import"))
        .and(query_param("action", "upsert"))
        .and(query_param("batch_size", "50"))
        .and(header("content-type", "text/plain"))
        .and(body_string("{\"title\":\"Dune\"}\n{\"title\":\"Emma\"}"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"success\":true}\n{\"success\":false,\"error\":\"Bad JSON.\",\"code\":400}",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client_for(&server)
        .import_documents(
            "books",
            &[json!({"title": "Dune"}), json!({"title": "Emma"})],
            ImportAction::Upsert,
            Some(50),
        )
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.results[1].code, Some(400));
}

#[tokio::test]
async fn test_create_with_jsonl_imports_every_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(201).set_body_json(books_collection()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/books/documents/import"))
        .and(query_param("action", "create"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"success\":true}\n{\"success\":true}\n{\"success\":true}"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let payload = "{\"title\":\"Dune\"}\n{\"title\":\"Emma\"}\n\n{\"title\":\"Ulysses\"}\n";
    let outcome = client_for(&server)
        .create_collection_with_jsonl(&books_schema(), payload)
        .await
        .unwrap();

    assert_eq!(outcome.collection.name, "books");
    assert_eq!(outcome.import.succeeded, 3);
    assert!(outcome.import.is_complete());
}

#[tokio::test]
async fn test_create_with_malformed_jsonl_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let payload = "{\"title\":\"Dune\"}\n{\"title\": oops}\n";
    let err = client_for(&server)
        .create_collection_with_jsonl(&books_schema(), payload)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Jsonl { line: 2, .. }), "{:?}", err);
}

#[tokio::test]
async fn test_create_failure_skips_import() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"message": "A collection with name `books` already exists."})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/books/documents/import"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_collection_with_jsonl(&books_schema(), "{\"title\":\"Dune\"}")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn test_create_name_mismatch_is_a_logic_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "other", "fields": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/other/documents/import"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_collection_with_jsonl(&books_schema(), "{\"title\":\"Dune\"}")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Logic);
}

#[tokio::test]
async fn test_keys_and_cluster_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{"id": 1, "value_prefix": "abcd", "description": "search only",
                      "actions": ["documents:search"], "collections": ["*"]}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/keys/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/metrics.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "system_cpu_active_percentage": "3.2",
            "system_memory_total_bytes": "16777216"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let keys = client.list_keys().await.unwrap();
    assert_eq!(keys.keys[0].value_prefix.as_deref(), Some("abcd"));
    assert_eq!(client.delete_key(1).await.unwrap().id, 1);

    let metrics = client.metrics().await.unwrap();
    assert_eq!(metrics["system_cpu_active_percentage"], "3.2");
}

#[tokio::test]
async fn test_idempotent_requests_retry_on_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let options = RequestOptions {
        timeout: Duration::from_millis(200),
        max_retries: 1,
        retry_backoff: Duration::from_millis(10),
    };
    let client = TypesenseClient::with_http(reqwest::Client::new(), config_for(&server), options);
    let err = client.health().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_create_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(books_collection())
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = RequestOptions {
        timeout: Duration::from_millis(200),
        max_retries: 3,
        retry_backoff: Duration::from_millis(10),
    };
    let client = TypesenseClient::with_http(reqwest::Client::new(), config_for(&server), options);
    let err = client.create_collection(&books_schema()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}
