use csv_search::config::Config;
use csv_search::server::serve;
use csv_search::store::memory::InMemoryStore;
use csv_search::store::RowStore;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn spawn_app(store: Arc<InMemoryStore>, batch_size: usize) -> String {
    let mut config = Config::default();
    config.ingest.batch_size = batch_size;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dyn_store: Arc<dyn RowStore> = store;
    tokio::spawn(async move {
        serve(listener, Arc::new(config), dyn_store).await.unwrap();
    });

    format!("http://{}", addr)
}

fn csv_form(name: &str, body: &str) -> Form {
    let part = Part::bytes(body.as_bytes().to_vec())
        .file_name(name.to_string())
        .mime_str("text/csv")
        .unwrap();
    Form::new().part("file", part)
}

async fn upload(base: &str, form: Form) -> (u16, Value) {
    let res = reqwest::Client::new()
        .post(format!("{}/api/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

async fn search(base: &str, query: &str) -> (u16, Value) {
    let res = reqwest::get(format!("{}/api/search?{}", base, query))
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

fn numbered_csv(n: usize) -> String {
    let mut s = String::from("id,city\n");
    for i in 0..n {
        let city = if i % 2 == 0 { "Lisbon" } else { "Oslo" };
        s.push_str(&format!("{},{}\n", i, city));
    }
    s
}

#[tokio::test]
async fn test_upload_then_search_all() {
    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store.clone(), 4).await;

    let (status, body) = upload(&base, csv_form("cities.csv", &numbered_csv(10))).await;
    assert_eq!(status, 200, "upload failed: {}", body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["rows"], 10);
    assert_eq!(store.insert_calls(), 3);

    let (status, page) = search(&base, "pageSize=3").await;
    assert_eq!(status, 200);
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 3);
    assert_eq!(page["total"], 10);
    let rows = page["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[0]["data"]["id"], "0");
    assert_eq!(rows[2]["id"], 3);
}

#[tokio::test]
async fn test_search_term_filters() {
    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store, 100).await;
    upload(&base, csv_form("cities.csv", &numbered_csv(10))).await;

    let (_, page) = search(&base, "q=oslo").await;
    assert_eq!(page["total"], 5);
    for row in page["rows"].as_array().unwrap() {
        assert_eq!(row["data"]["city"], "Oslo");
    }
}

#[tokio::test]
async fn test_quoted_fields_survive_upload() {
    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store, 100).await;

    let csv = "a,b\n1,2\n3,\"  x,y \"\n4\n";
    let (status, body) = upload(&base, csv_form("q.csv", csv)).await;
    assert_eq!(status, 200);
    assert_eq!(body["rows"], 3);

    let (_, page) = search(&base, "").await;
    assert_eq!(page["rows"][1]["data"]["b"], "  x,y ");
    assert_eq!(page["rows"][2]["data"]["b"], "");
}

#[tokio::test]
async fn test_part_content_encoding_is_decoded() {
    use async_compression::tokio::write::GzipEncoder;
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING};
    use tokio::io::AsyncWriteExt;

    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store.clone(), 100).await;

    let mut encoder = GzipEncoder::new(Vec::new());
    encoder.write_all(numbered_csv(6).as_bytes()).await.unwrap();
    encoder.shutdown().await.unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    let part = Part::bytes(encoder.into_inner())
        .file_name("upload.bin")
        .mime_str("application/octet-stream")
        .unwrap()
        .headers(headers);

    let (status, body) = upload(&base, Form::new().part("file", part)).await;
    assert_eq!(status, 200, "upload failed: {}", body);
    assert_eq!(body["rows"], 6);
    assert_eq!(store.documents()[5]["city"], "Oslo");
}

#[tokio::test]
async fn test_page_beyond_last_is_empty() {
    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store, 100).await;
    upload(&base, csv_form("cities.csv", &numbered_csv(5))).await;

    let (status, page) = search(&base, "page=4&pageSize=2").await;
    assert_eq!(status, 200);
    assert_eq!(page["total"], 5);
    assert_eq!(page["rows"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_pagination_params_clamped() {
    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store, 100).await;

    let (_, page) = search(&base, "page=-3&pageSize=100000").await;
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 500);

    let (_, page) = search(&base, "page=abc&pageSize=0").await;
    assert_eq!(page["page"], 1);
    assert_eq!(page["pageSize"], 1);
}

#[tokio::test]
async fn test_upload_without_file_is_bad_request() {
    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store, 100).await;

    let form = Form::new().text("note", "no file here");
    let (status, body) = upload(&base, form).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn test_malformed_csv_is_server_error() {
    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store.clone(), 2).await;

    let (status, body) = upload(&base, csv_form("bad.csv", "a,b\n1,2\n3,4\n5,6,7\n")).await;
    assert_eq!(status, 500);
    assert!(body["error"].as_str().unwrap().contains("mismatch"));
    // First full batch was committed before the bad row.
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_insert_failure_is_server_error() {
    let store = Arc::new(InMemoryStore::failing_on_insert(2));
    let base = spawn_app(store.clone(), 3).await;

    let (status, body) = upload(&base, csv_form("cities.csv", &numbered_csv(10))).await;
    assert_eq!(status, 500);
    assert!(body["error"].as_str().unwrap().contains("insert of 3 rows failed"));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_index_and_health() {
    let store = Arc::new(InMemoryStore::new());
    let base = spawn_app(store, 100).await;

    let html = reqwest::get(format!("{}/", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("Upload CSV"));

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}
