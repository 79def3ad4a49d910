//! Build sessions against a mocked Azure blob container
//!
//! The mock keeps uploaded blobs in memory, so a second session can restore
//! what the first one stored.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use monobuild::core::builder::{BuildOrchestrator, BuildStep};
use monobuild::core::cache_config::{AzureBlobStorageOptions, AzureEnvironment};
use monobuild::core::graph::ProjectGraph;
use monobuild::core::project::{Project, ProjectDescriptor};
use monobuild::core::report::ProjectStatus;
use monobuild::error::BuildError;
use monobuild::infra::cache::BlobStoreCacheProvider;

/// In-memory blob container
#[derive(Clone, Default)]
struct BlobContainer {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl BlobContainer {
    fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

impl Respond for BlobContainer {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let name = request.url.path().to_string();
        let mut blobs = self.blobs.lock().unwrap();
        match request.method.as_str() {
            "PUT" => {
                if blobs.contains_key(&name) {
                    return ResponseTemplate::new(409);
                }
                blobs.insert(name, request.body.clone());
                ResponseTemplate::new(201)
            }
            "GET" => match blobs.get(&name) {
                Some(body) => ResponseTemplate::new(200).set_body_bytes(body.clone()),
                None => ResponseTemplate::new(404),
            },
            "HEAD" if blobs.contains_key(&name) => ResponseTemplate::new(200),
            _ => ResponseTemplate::new(404),
        }
    }
}

/// Writes `dist/out.txt` and counts invocations
#[derive(Default)]
struct CountingStep {
    runs: Mutex<Vec<String>>,
}

#[async_trait]
impl BuildStep for CountingStep {
    async fn run(&self, project: &Project, project_dir: &Path) -> Result<(), BuildError> {
        self.runs
            .lock()
            .unwrap()
            .push(project.package_name().to_string());
        std::fs::create_dir_all(project_dir.join("dist")).unwrap();
        std::fs::write(project_dir.join("dist/out.txt"), project.package_name()).unwrap();
        Ok(())
    }
}

fn options(write: bool) -> AzureBlobStorageOptions {
    AzureBlobStorageOptions {
        storage_account_name: "acme".to_string(),
        storage_container_name: "cache".to_string(),
        azure_environment: AzureEnvironment::AzurePublicCloud,
        blob_prefix: Some("ci".to_string()),
        is_cache_write_allowed: write,
    }
}

fn provider(server: &MockServer, write: bool, credential: Option<&str>) -> Arc<BlobStoreCacheProvider> {
    Arc::new(
        BlobStoreCacheProvider::new(&options(write), credential.map(ToString::to_string))
            .with_endpoint(&format!("{}/cache", server.uri()))
            .with_retry_budget(Duration::ZERO),
    )
}

fn graph(root: &Path) -> Arc<ProjectGraph> {
    for folder in ["core", "app"] {
        std::fs::create_dir_all(root.join(folder)).unwrap();
        std::fs::write(root.join(folder).join("index.js"), folder).unwrap();
    }
    Arc::new(
        ProjectGraph::build(
            root,
            &[
                ProjectDescriptor::new("core", "core"),
                ProjectDescriptor::new("app", "app").with_dependencies(["core"]),
            ],
        )
        .unwrap(),
    )
}

async fn start_container() -> (MockServer, BlobContainer) {
    let server = MockServer::start().await;
    let container = BlobContainer::default();
    Mock::given(any())
        .respond_with(container.clone())
        .mount(&server)
        .await;
    (server, container)
}

#[tokio::test]
async fn test_second_session_restores_from_blob_store() {
    let temp = TempDir::new().unwrap();
    let graph = graph(temp.path());
    let (server, container) = start_container().await;

    let first = Arc::new(CountingStep::default());
    let report = BuildOrchestrator::new(Arc::clone(&graph), first.clone())
        .with_cache(provider(&server, true, Some("sig=abc")))
        .run()
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(first.runs.lock().unwrap().len(), 2);
    assert_eq!(container.len(), 2);

    std::fs::remove_dir_all(temp.path().join("app/dist")).unwrap();
    let second = Arc::new(CountingStep::default());
    let report = BuildOrchestrator::new(graph, second.clone())
        .with_cache(provider(&server, false, None))
        .run()
        .await
        .unwrap();

    assert!(second.runs.lock().unwrap().is_empty());
    assert_eq!(report.count(ProjectStatus::Skipped), 2);
    assert_eq!(
        std::fs::read_to_string(temp.path().join("app/dist/out.txt")).unwrap(),
        "app"
    );
}

#[tokio::test]
async fn test_read_only_blob_store_never_uploads() {
    let temp = TempDir::new().unwrap();
    let (server, container) = start_container().await;

    let report = BuildOrchestrator::new(graph(temp.path()), Arc::new(CountingStep::default()))
        .with_cache(provider(&server, false, Some("sig=abc")))
        .run()
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(container.len(), 0);
}

#[tokio::test]
async fn test_missing_credential_never_uploads() {
    let temp = TempDir::new().unwrap();
    let (server, container) = start_container().await;

    let report = BuildOrchestrator::new(graph(temp.path()), Arc::new(CountingStep::default()))
        .with_cache(provider(&server, true, None))
        .run()
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(container.len(), 0);
}

#[tokio::test]
async fn test_unreachable_blob_store_still_builds() {
    let temp = TempDir::new().unwrap();
    let step = Arc::new(CountingStep::default());
    let unreachable = Arc::new(
        BlobStoreCacheProvider::new(&options(true), Some("sig=abc".to_string()))
            .with_endpoint("http://127.0.0.1:9/cache")
            .with_retry_budget(Duration::from_secs(30)),
    );
    let started = Instant::now();

    let report = BuildOrchestrator::new(graph(temp.path()), step.clone())
        .with_cache(unreachable.clone())
        .with_parallelism(1)
        .run()
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(step.runs.lock().unwrap().len(), 2);
    assert!(unreachable.is_unreachable());
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "took {:?}",
        started.elapsed()
    );
}
