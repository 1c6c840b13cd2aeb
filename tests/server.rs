use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use camino::Utf8PathBuf;

use faostat_aggregator::app::Aggregator;
use faostat_aggregator::archive::ArchiveClient;
use faostat_aggregator::domain::{Catalog, DatasetEntry, DatasetList};
use faostat_aggregator::error::AggregatorError;
use faostat_aggregator::server;
use faostat_aggregator::store::CatalogStore;
use faostat_aggregator::upstream::CatalogClient;

struct StaticCatalog(Catalog);

#[async_trait]
impl CatalogClient for StaticCatalog {
    async fn fetch_catalog(&self) -> Result<Catalog, AggregatorError> {
        Ok(self.0.clone())
    }
}

/// Serves an in-memory zip for every fetch and counts the calls.
struct ZipArchiveClient {
    members: Vec<(String, Vec<u8>)>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ArchiveClient for ZipArchiveClient {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, AggregatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut buffer = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
            for (name, content) in &self.members {
                writer
                    .start_file(name.as_str(), zip::write::SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(content).unwrap();
            }
            writer.finish().unwrap();
        }
        Ok(buffer)
    }
}

fn sample_catalog() -> Catalog {
    Catalog {
        datasets: DatasetList {
            xmlns_xsi: Some("http://www.w3.org/2001/XMLSchema-instance".to_string()),
            entries: vec![DatasetEntry {
                code: "QCL".parse().unwrap(),
                name: "Crops and livestock products".to_string(),
                topic: "Production".to_string(),
                description: String::new(),
                contact: String::new(),
                email: String::new(),
                date_update: "2026-01-15".to_string(),
                compression_format: "zip".to_string(),
                file_type: "csv".to_string(),
                file_size: "34MB".to_string(),
                file_rows: 42,
                file_location: "https://example.org/QCL.zip".to_string(),
            }],
        },
    }
}

struct TestServer {
    addr: SocketAddr,
    scratch: Utf8PathBuf,
    archive_calls: Arc<AtomicUsize>,
    _temp: tempfile::TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

async fn spawn_server(save_catalog: bool, members: &[(&str, &[u8])]) -> TestServer {
    let temp = tempfile::tempdir().unwrap();
    let store_path =
        Utf8PathBuf::from_path_buf(temp.path().join("upd_data").join("dataset.json")).unwrap();
    let scratch = Utf8PathBuf::from_path_buf(temp.path().join("temp")).unwrap();

    let store = CatalogStore::new(store_path);
    if save_catalog {
        store.save(&sample_catalog()).unwrap();
    }

    let archive_calls = Arc::new(AtomicUsize::new(0));
    let archive_client = ZipArchiveClient {
        members: members
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_vec()))
            .collect(),
        calls: archive_calls.clone(),
    };
    let aggregator = Arc::new(Aggregator::new(
        store,
        scratch.clone(),
        StaticCatalog(sample_catalog()),
        archive_client,
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(aggregator);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        addr,
        scratch,
        archive_calls,
        _temp: temp,
    }
}

#[tokio::test]
async fn catalog_endpoint_returns_mirrored_document() {
    let server = spawn_server(true, &[]).await;

    let response = reqwest::get(server.url("/")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["Datasets"]["Dataset"][0]["DatasetCode"], "QCL");
    assert_eq!(body["Datasets"]["Dataset"][0]["FileRows"], 42);
}

#[tokio::test]
async fn catalog_endpoint_before_first_refresh_is_503() {
    let server = spawn_server(false, &[]).await;

    let response = reqwest::get(server.url("/")).await.unwrap();
    assert_eq!(response.status(), 503);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 503);
    assert!(body["error"]["timestamp"].is_string());
}

#[tokio::test]
async fn unknown_dataset_is_404_without_archive_fetch() {
    let server = spawn_server(true, &[]).await;

    let response = reqwest::get(server.url("/dataset/NOPE")).await.unwrap();
    assert_eq!(response.status(), 404);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], 404);
    assert_eq!(body["error"]["message"], "Dataset not found");
    assert!(body["error"]["timestamp"].is_string());
    assert_eq!(server.archive_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dataset_request_serves_extracted_csv_and_cleans_archive() {
    let server = spawn_server(
        true,
        &[
            ("QCL_All_Data_(Normalized).csv", b"a,b\n1,2\n".as_slice()),
            ("QCL_Flags.csv", b"flag\n".as_slice()),
        ],
    )
    .await;

    let response = reqwest::get(server.url("/dataset/QCL")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/csv"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"a,b\n1,2\n");

    // Archive gone, extraction kept for reuse.
    assert!(!server.scratch.join("QCL.zip").as_std_path().exists());
    assert!(
        server
            .scratch
            .join("QCL/QCL_All_Data_(Normalized).csv")
            .as_std_path()
            .exists()
    );

    // A second request is served from the extraction cache.
    let response = reqwest::get(server.url("/dataset/QCL")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(server.archive_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn archive_without_normalized_csv_is_404() {
    let server = spawn_server(true, &[("QCL_Flags.csv", b"flag\n".as_slice())]).await;

    let response = reqwest::get(server.url("/dataset/QCL")).await.unwrap();
    assert_eq!(response.status(), 404);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Dataset CSV was not found");
    assert!(!server.scratch.join("QCL.zip").as_std_path().exists());
}
