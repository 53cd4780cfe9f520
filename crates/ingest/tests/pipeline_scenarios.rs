//! 통합 테스트 -- 탐색부터 웹훅 전달, 원장 기록까지의 전체 흐름 검증
//!
//! 오브젝트 스토리지는 인메모리 구현으로, 웹훅은 wiremock 서버로 대체합니다.
//! 테넌트 목록과 원장은 임시 디렉토리의 파일을 사용합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eventbridge_core::config::IngestConfig;
use eventbridge_core::environment::{Environment, LoadSource};
use eventbridge_core::job::{BoxFuture, Job, JobCodec, JobResult, META_ORIGINAL_ERROR};
use eventbridge_core::types::Provider;
use eventbridge_ingest::job::discovery::{META_ITEMS_QUEUED, META_TENANT_ERRORS};
use eventbridge_ingest::ledger::LedgerConfig;
use eventbridge_ingest::{
    DiscoveryJob, IngestError, ObjectInfo, ObjectStore, ObjectStoreConnector, PipelineContext,
    PipelineJob,
};

const TENANT: &str = "6f1c1f4e-3a8e-4c39-9a55-0c1f3bdfa001";
const OTHER_TENANT: &str = "0b7a1c2d-5e6f-4a8b-9c0d-1e2f3a4b5c6d";
const BUCKET: &str = "acme-logs";
const HEADER: &str = "#Version: 1.0\n#Fields: s3 access log\n";

fn log_line(request_id: &str, operation: &str, key: &str) -> String {
    format!(
        "79a5 {BUCKET} [06/Feb/2019:00:00:38 +0000] 192.0.2.3 arn:aws:iam::1:user/a {request_id} {operation} {key} \"PUT /{key} HTTP/1.1\" 200 - 10 20 5 3 \"-\" \"curl/7.1\" -"
    )
}

fn log_file(lines: &[String]) -> String {
    let mut content = HEADER.to_owned();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    content
}

/// 버킷 → (키, 내용) 목록을 보관하는 인메모리 스토리지
#[derive(Default)]
struct MemoryStore {
    buckets: HashMap<String, Vec<(String, String)>>,
}

impl MemoryStore {
    fn with_objects(objects: &[(&str, String)]) -> Self {
        let mut store = Self::default();
        store.buckets.insert(
            BUCKET.to_owned(),
            objects
                .iter()
                .map(|(key, content)| ((*key).to_owned(), content.clone()))
                .collect(),
        );
        store
    }
}

impl ObjectStore for MemoryStore {
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ObjectInfo>, IngestError>> {
        Box::pin(async move {
            let objects = self.buckets.get(bucket).ok_or_else(|| IngestError::Storage {
                bucket: bucket.to_owned(),
                reason: "no such bucket".to_owned(),
            })?;
            Ok(objects
                .iter()
                .map(|(key, content)| ObjectInfo {
                    key: key.clone(),
                    size: content.len() as u64,
                    last_modified: None,
                })
                .collect())
        })
    }

    fn fetch_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<PathBuf, IngestError>> {
        Box::pin(async move {
            let content = self
                .buckets
                .get(bucket)
                .and_then(|objects| objects.iter().find(|(k, _)| k == key))
                .map(|(_, content)| content.clone())
                .ok_or_else(|| IngestError::Storage {
                    bucket: bucket.to_owned(),
                    reason: format!("no such key: {key}"),
                })?;
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(dest, content).await?;
            Ok(dest.to_path_buf())
        })
    }
}

struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl ObjectStoreConnector for MemoryConnector {
    fn connect<'a>(
        &'a self,
        _provider: &'a Provider,
    ) -> BoxFuture<'a, Result<Arc<dyn ObjectStore>, IngestError>> {
        let store: Arc<dyn ObjectStore> = self.store.clone();
        Box::pin(async move { Ok(store) })
    }
}

/// 테넌트 한 명의 YAML 항목. `buckets`는 (버킷, provider) 쌍입니다.
fn tenant_yaml(
    server: &MockServer,
    id: &str,
    buckets: &[(&str, &str)],
    extra: &str,
) -> String {
    let address = server.address();
    let mut yaml = format!("- id: {id}\n  name: tenant-{id}\n  logs:\n");
    for (bucket, provider) in buckets {
        yaml.push_str(&format!(
            "    - name: {bucket}\n      logFormat: s3\n      provider: {provider}\n{extra}"
        ));
    }
    yaml.push_str(&format!(
        "  providers:\n    - name: memory\n  config:\n    hook:\n      name: s3events\n      host: \"{}\"\n      port: \"{}\"\n",
        address.ip(),
        address.port()
    ));
    yaml
}

fn processor_items(jobs: &[PipelineJob]) -> Vec<&eventbridge_ingest::LogQueueItem> {
    jobs.iter()
        .map(|job| match job {
            PipelineJob::Processor(p) => p.item(),
            PipelineJob::Discovery(_) => unreachable!("discovery only emits processor jobs"),
        })
        .collect()
}

struct Harness {
    dir: tempfile::TempDir,
    ctx: Arc<PipelineContext>,
}

impl Harness {
    /// 테넌트 하나와 버킷 하나를 가진 파이프라인을 구성합니다.
    fn new(server: &MockServer, store: MemoryStore, filter: &str, prune: bool) -> Self {
        let extra = format!("      pruneAfterProcessing: {prune}\n      filter: {filter}\n");
        let customers = tenant_yaml(server, TENANT, &[(BUCKET, "memory")], &extra);
        Self::with_customers(&customers, store, Environment::default())
    }

    /// 테넌트 YAML과 런타임 환경으로 파이프라인을 구성합니다.
    /// 로딩 소스와 테넌트 파일 경로는 항상 임시 디렉토리의 파일로 설정됩니다.
    fn with_customers(customers: &str, store: MemoryStore, env: Environment) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let customers_file = dir.path().join("customers.yaml");
        std::fs::write(&customers_file, customers).unwrap();

        let config = IngestConfig {
            download_dir: dir.path().join("downloads").display().to_string(),
            ledger_dir: dir.path().join("ledger").display().to_string(),
            ..Default::default()
        };
        let env = Environment {
            load_from: LoadSource::Filesystem,
            config_file: customers_file.display().to_string(),
            ..env
        };
        let connector = Arc::new(MemoryConnector {
            store: Arc::new(store),
        });
        let ctx = PipelineContext::from_config(&config, connector)
            .unwrap()
            .with_environment(env);

        Self {
            dir,
            ctx: Arc::new(ctx),
        }
    }

    /// 탐색을 한 번 실행하고 결과와 디스패치된 작업을 반환합니다.
    async fn discover(&self) -> (JobResult, Vec<PipelineJob>) {
        let (tx, mut rx) = mpsc::channel(64);
        let mut job = PipelineJob::from(DiscoveryJob::new(Arc::clone(&self.ctx)));
        job.init(Some(tx)).unwrap();
        let result = job.execute().await;
        drop(job);

        let mut emitted = Vec::new();
        while let Some(job) = rx.recv().await {
            emitted.push(job);
        }
        (result, emitted)
    }

    async fn ledger_len(&self) -> usize {
        let config = LedgerConfig::disk(TENANT.parse().unwrap());
        self.ctx.ledger().load(&config).await.unwrap().len()
    }

    fn download_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }
}

#[tokio::test]
async fn three_unprocessed_objects_are_delivered_once_each() {
    // Given: 3 objects, each with a single matching record
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/s3events"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let objects: Vec<(&str, String)> = ["2019/02/06/a.log", "2019/02/06/b.log", "2019/02/06/c.log"]
        .into_iter()
        .enumerate()
        .map(|(i, key)| {
            let line = log_line(&format!("REQ{i}"), "REST.PUT.OBJECT", "photos/a.jpg");
            (key, log_file(&[line]))
        })
        .collect();
    let harness = Harness::new(&server, MemoryStore::with_objects(&objects), "{}", false);

    // When: discovery runs
    let (result, jobs) = harness.discover().await;

    // Then: exactly 3 processor jobs are emitted
    assert!(!result.is_error());
    assert_eq!(result.metadata()[META_ITEMS_QUEUED], "3");
    assert_eq!(jobs.len(), 3);
    assert!(harness.download_dir().exists());

    // When: each processor job runs
    for mut job in jobs {
        let result = job.execute().await;
        assert!(!result.is_error(), "{:?}", result.metadata());
    }

    // Then: one ledger entry per object
    assert_eq!(harness.ledger_len().await, 3);
}

#[tokio::test]
async fn processed_objects_are_not_rediscovered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let line = log_line("REQ1", "REST.PUT.OBJECT", "photos/a.jpg");
    let objects = [("2019/02/06/a.log", log_file(&[line]))];
    let harness = Harness::new(&server, MemoryStore::with_objects(&objects), "{}", false);

    let (_, jobs) = harness.discover().await;
    for mut job in jobs {
        assert!(!job.execute().await.is_error());
    }

    let (result, jobs) = harness.discover().await;
    assert!(jobs.is_empty());
    assert_eq!(result.metadata()[META_ITEMS_QUEUED], "0");
}

#[tokio::test]
async fn webhook_failure_leaves_object_for_next_pass() {
    // Given: a 3-record object and a webhook that always returns 500
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let lines: Vec<String> = (0..3)
        .map(|i| log_line(&format!("REQ{i}"), "REST.PUT.OBJECT", "photos/a.jpg"))
        .collect();
    let objects = [("2019/02/06/a.log", log_file(&lines))];
    let harness = Harness::new(&server, MemoryStore::with_objects(&objects), "{}", true);

    // When
    let (_, jobs) = harness.discover().await;
    assert_eq!(jobs.len(), 1);
    let mut job = jobs.into_iter().next().unwrap();
    let result = job.execute().await;

    // Then: error result, no ledger entry, and the object is re-emitted
    assert!(result.is_error());
    assert!(result.metadata()[META_ORIGINAL_ERROR].contains("500"));
    let decoded = PipelineJob::decode(&result).unwrap();
    assert_eq!(decoded.id(), job.id());
    assert_eq!(harness.ledger_len().await, 0);

    let (_, jobs) = harness.discover().await;
    assert_eq!(jobs.len(), 1);
}

#[tokio::test]
async fn method_filter_delivers_only_put() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "operation": "REST.PUT.OBJECT" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "operation": "REST.GET.OBJECT" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let lines = vec![
        log_line("REQ1", "REST.PUT.OBJECT", "photos/a.jpg"),
        log_line("REQ2", "REST.GET.OBJECT", "photos/a.jpg"),
    ];
    let objects = [("2019/02/06/a.log", log_file(&lines))];
    let harness = Harness::new(
        &server,
        MemoryStore::with_objects(&objects),
        "{ matchedHTTPMethods: [PUT] }",
        false,
    );

    let (_, jobs) = harness.discover().await;
    for mut job in jobs {
        let result = job.execute().await;
        assert!(!result.is_error());
        assert_eq!(result.metadata()["records_delivered"], "1");
    }
}

#[tokio::test]
async fn prune_removes_local_copy_after_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let line = log_line("REQ1", "REST.PUT.OBJECT", "photos/a.jpg");
    let objects = [("2019/02/06/a.log", log_file(&[line]))];
    let harness = Harness::new(&server, MemoryStore::with_objects(&objects), "{}", true);

    let (_, jobs) = harness.discover().await;
    assert_eq!(jobs.len(), 1);
    for mut job in jobs {
        let location = match &job {
            PipelineJob::Processor(p) => p.item().location.clone(),
            PipelineJob::Discovery(_) => unreachable!("discovery only emits processor jobs"),
        };
        assert!(location.exists());
        assert!(!job.execute().await.is_error());
        assert!(!location.exists());
    }
    assert_eq!(harness.ledger_len().await, 1);
}

#[tokio::test]
async fn discovery_does_not_wait_for_dispatch_channel_space() {
    // Given: 5 unprocessed objects and a dispatch channel that holds 2
    let server = MockServer::start().await;
    let keys = ["a.log", "b.log", "c.log", "d.log", "e.log"];
    let objects: Vec<(&str, String)> = keys
        .iter()
        .map(|key| (*key, log_file(&[log_line("REQ1", "REST.PUT.OBJECT", "photos/a.jpg")])))
        .collect();
    let harness = Harness::new(&server, MemoryStore::with_objects(&objects), "{}", false);
    let (tx, mut rx) = mpsc::channel(2);
    let mut job = PipelineJob::from(DiscoveryJob::new(Arc::clone(&harness.ctx)));
    job.init(Some(tx)).unwrap();

    // When: discovery runs while nobody reads the channel
    let result = tokio::time::timeout(Duration::from_secs(5), job.execute())
        .await
        .expect("discovery blocked on a full dispatch channel");
    drop(job);

    // Then: the pass completes and all 5 jobs arrive in listing order
    assert!(!result.is_error());
    assert_eq!(result.metadata()[META_ITEMS_QUEUED], "5");
    let mut emitted = Vec::new();
    while let Some(job) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("processor jobs were not forwarded")
    {
        emitted.push(job);
    }
    let names: Vec<&str> = processor_items(&emitted)
        .into_iter()
        .map(|item| item.name.as_str())
        .collect();
    assert_eq!(names, keys);
}

#[tokio::test]
async fn keys_differing_only_in_separator_are_delivered_separately() {
    // Given: "x/y.log" and "x_y.log", each with its own record
    let server = MockServer::start().await;
    for request_id in ["REQ_A", "REQ_B"] {
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "requestId": request_id })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }
    let objects = [
        ("x/y.log", log_file(&[log_line("REQ_A", "REST.PUT.OBJECT", "photos/a.jpg")])),
        ("x_y.log", log_file(&[log_line("REQ_B", "REST.PUT.OBJECT", "photos/b.jpg")])),
    ];
    let harness = Harness::new(&server, MemoryStore::with_objects(&objects), "{}", false);

    // When
    let (_, jobs) = harness.discover().await;
    assert_eq!(jobs.len(), 2);
    let locations: Vec<PathBuf> = processor_items(&jobs)
        .iter()
        .map(|item| item.location.clone())
        .collect();
    assert_ne!(locations[0], locations[1]);
    for mut job in jobs {
        assert!(!job.execute().await.is_error());
    }

    // Then: each record was delivered once and both objects are recorded
    assert_eq!(harness.ledger_len().await, 2);
}

#[tokio::test]
async fn failing_tenant_does_not_block_other_tenants() {
    // Given: one healthy tenant and one whose bucket cannot be listed
    let server = MockServer::start().await;
    let line = log_line("REQ1", "REST.PUT.OBJECT", "photos/a.jpg");
    let objects = [("2019/02/06/a.log", log_file(&[line]))];
    let customers = format!(
        "{}{}",
        tenant_yaml(&server, OTHER_TENANT, &[("missing-bucket", "memory")], ""),
        tenant_yaml(&server, TENANT, &[(BUCKET, "memory")], "")
    );
    let harness = Harness::with_customers(
        &customers,
        MemoryStore::with_objects(&objects),
        Environment::default(),
    );

    // When
    let mut job = DiscoveryJob::new(Arc::clone(&harness.ctx));
    let (tx, mut rx) = mpsc::channel(8);
    job.init(Some(tx)).unwrap();
    let result = job.run().await.unwrap();

    // Then: the healthy tenant's object is queued and the failure is reported
    assert_eq!(result.metadata()[META_ITEMS_QUEUED], "1");
    assert_eq!(result.metadata()[META_TENANT_ERRORS], "1");
    let errors = job.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(OTHER_TENANT), "{errors:?}");
    assert!(errors[0].contains("missing-bucket"), "{errors:?}");

    drop(job);
    let mut emitted = Vec::new();
    while let Some(job) = rx.recv().await {
        emitted.push(job);
    }
    let items = processor_items(&emitted);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id.to_string(), TENANT);
}

#[tokio::test]
async fn bucket_with_unknown_provider_is_skipped() {
    // Given: a tenant with one bucket on an undeclared provider and one on a known provider
    let server = MockServer::start().await;
    let line = log_line("REQ1", "REST.PUT.OBJECT", "photos/a.jpg");
    let mut store = MemoryStore::with_objects(&[("2019/02/06/a.log", log_file(&[line.clone()]))]);
    store.buckets.insert(
        "orphan-logs".to_owned(),
        vec![("2019/02/06/b.log".to_owned(), log_file(&[line]))],
    );
    let customers = tenant_yaml(
        &server,
        TENANT,
        &[("orphan-logs", "gcs"), (BUCKET, "memory")],
        "",
    );
    let harness = Harness::with_customers(&customers, store, Environment::default());

    // When
    let (result, jobs) = harness.discover().await;

    // Then: only the bucket with a known provider is queued, without a tenant error
    assert!(!result.is_error());
    assert_eq!(result.metadata()[META_TENANT_ERRORS], "0");
    let items = processor_items(&jobs);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].bucket, BUCKET);
}

#[tokio::test]
async fn post_host_override_replaces_tenant_webhook_host() {
    // Given: an environment with postHost set
    let server = MockServer::start().await;
    let line = log_line("REQ1", "REST.PUT.OBJECT", "photos/a.jpg");
    let objects = [("2019/02/06/a.log", log_file(&[line]))];
    let customers = tenant_yaml(&server, TENANT, &[(BUCKET, "memory")], "");
    let env = Environment {
        post_host: "hooks.internal.example".to_owned(),
        ..Default::default()
    };
    let harness = Harness::with_customers(&customers, MemoryStore::with_objects(&objects), env);

    // When
    let (_, jobs) = harness.discover().await;

    // Then: the emitted item targets the override host and keeps the tenant's port and name
    let items = processor_items(&jobs);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].webhook.host, "hooks.internal.example");
    assert_eq!(items[0].webhook.port, server.address().port().to_string());
    assert_eq!(items[0].webhook.name, "s3events");
}
