//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small four-level directory and drive
//! the real HTTP page client and SQLite store end-to-end.

use division_harvester::config::Config;
use division_harvester::crawler::{crawl, FetchError};
use division_harvester::storage::{RunStatus, SqliteRegionStore};
use division_harvester::{Expansion, HarvestError, Level, RegionNode, RegionStore};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX: &str = r#"<html><body><table class='provincetable'>
<tr class='provincehead'><td colspan=8>省级</td></tr>
<tr class='provincetr'>
  <td><a href='11.html'>北京市<br/></a></td>
  <td><a href='12.html'>天津市<br/></a></td>
</tr></table></body></html>"#;

const BEIJING: &str = r#"<html><body><table class='citytable'>
<tr class='cityhead'><td>统计用区划代码</td><td>名称</td></tr>
<tr class='citytr'>
  <td><a href='11/1101.html'>110100000000</a></td>
  <td><a href='11/1101.html'>市辖区</a></td>
</tr></table></body></html>"#;

const TIANJIN: &str = r#"<html><body><table class='citytable'>
<tr class='citytr'>
  <td><a href='12/1201.html'>120100000000</a></td>
  <td><a href='12/1201.html'>市辖区</a></td>
</tr></table></body></html>"#;

const BEIJING_CITY: &str = r#"<html><body><table class='countytable'>
<tr class='countytr'><td>110101000000</td><td>市辖区</td></tr>
<tr class='countytr'>
  <td><a href='01/110101.html'>110102000000</a></td>
  <td><a href='01/110101.html'>东城区</a></td>
</tr></table></body></html>"#;

const TIANJIN_CITY: &str = "<html><body><p>暂无数据</p></body></html>";

const DONGCHENG: &str = r#"<html><body><table class='towntable'>
<tr class='towntr'>
  <td><a href='01/110101001.html'>110101001000</a></td>
  <td><a href='01/110101001.html'>东华门街道</a></td>
</tr>
<tr class='towntr'><td>110101002000</td><td>景山街道</td></tr>
</table></body></html>"#;

/// Directory pages keyed by request path
fn directory() -> Vec<(&'static str, &'static str)> {
    vec![
        ("/2018/index.html", INDEX),
        ("/2018/11.html", BEIJING),
        ("/2018/12.html", TIANJIN),
        ("/2018/11/1101.html", BEIJING_CITY),
        ("/2018/12/1201.html", TIANJIN_CITY),
        ("/2018/11/01/110101.html", DONGCHENG),
    ]
}

/// Mounts every directory page except those in `missing`, which answer 500
async fn mount_directory(server: &MockServer, missing: &[&str]) {
    for (page_path, body) in directory() {
        let response = if missing.contains(&page_path) {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8")
        };

        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(response)
            .mount(server)
            .await;
    }
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, db_path: &Path, depth: Level) -> Config {
    let mut config = Config::default();
    config.crawler.depth = depth;
    config.crawler.year = 2018;
    config.crawler.concurrency = 2;
    config.crawler.interval_ms = 10;
    config.crawler.timeout_ms = 2000;
    config.crawler.max_attempts = 2;
    config.crawler.retry_delay_ms = 10;
    config.source.index_url = format!("{}/{{year}}/index.html", server.uri());
    config.output.database_path = db_path.to_string_lossy().into_owned();
    config
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("data").join("database.sqlite")
}

fn open(db_path: &Path) -> SqliteRegionStore {
    SqliteRegionStore::new(db_path).expect("Failed to open database")
}

fn snapshot(db_path: &Path) -> Vec<Vec<RegionNode>> {
    let store = open(db_path);
    Level::ALL
        .iter()
        .map(|level| store.list_regions(*level, 2018).unwrap())
        .collect()
}

fn expansion(store: &SqliteRegionStore, level: Level, code: &str) -> Expansion {
    store
        .get_region(level, 2018, code)
        .unwrap()
        .unwrap_or_else(|| panic!("{} {} not stored", level, code))
        .expansion
}

async fn requests_for(server: &MockServer, page_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == page_path)
        .count()
}

#[tokio::test]
async fn test_full_crawl_to_districts() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server, &[]).await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    let report = crawl(create_test_config(&mock_server, &db, Level::District))
        .await
        .expect("Crawl failed");
    report.ensure_complete().unwrap();

    let store = open(&db);

    let provinces = store.list_regions(Level::Province, 2018).unwrap();
    assert_eq!(provinces.len(), 2);
    assert_eq!(provinces[0].code, "11");
    assert_eq!(provinces[0].name, "北京市");
    assert_eq!(
        provinces[0].url.as_deref(),
        Some(format!("{}/2018/11.html", mock_server.uri()).as_str())
    );

    assert_eq!(store.list_regions(Level::City, 2018).unwrap().len(), 2);

    // The municipal district row has no page and is not stored
    let districts = store.list_regions(Level::District, 2018).unwrap();
    assert_eq!(districts.len(), 1);
    assert_eq!(districts[0].code, "110102000000");
    assert_eq!(districts[0].parent_code.as_deref(), Some("110100000000"));

    assert_eq!(expansion(&store, Level::Province, "11"), Expansion::Expanded(1));
    assert_eq!(expansion(&store, Level::Province, "12"), Expansion::Expanded(1));
    assert_eq!(expansion(&store, Level::City, "110100000000"), Expansion::Expanded(1));
    assert_eq!(expansion(&store, Level::City, "120100000000"), Expansion::Expanded(0));
    assert_eq!(
        expansion(&store, Level::District, "110102000000"),
        Expansion::NotExpanded
    );
    assert!(store.list_regions(Level::Town, 2018).unwrap().is_empty());

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.depth, Level::District);
    assert_eq!(requests_for(&mock_server, "/2018/11/01/110101.html").await, 0);
}

#[tokio::test]
async fn test_crawl_to_towns() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server, &[]).await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    crawl(create_test_config(&mock_server, &db, Level::Town))
        .await
        .expect("Crawl failed");

    let store = open(&db);
    let towns = store.list_regions(Level::Town, 2018).unwrap();

    assert_eq!(towns.len(), 2);
    assert_eq!(towns[0].name, "东华门街道");
    assert!(towns[0].url.is_some());
    assert_eq!(towns[1].name, "景山街道");
    assert_eq!(towns[1].url, None);
    assert_eq!(
        expansion(&store, Level::District, "110102000000"),
        Expansion::Expanded(2)
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server, &[]).await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    crawl(create_test_config(&mock_server, &db, Level::Town))
        .await
        .expect("First crawl failed");
    let first = snapshot(&db);

    let report = crawl(create_test_config(&mock_server, &db, Level::Town))
        .await
        .expect("Second crawl failed");

    assert_eq!(snapshot(&db), first);
    assert_eq!(report.inserted(), 0);
    assert_eq!(report.level(Level::City).unwrap().frontier, 0);

    // Completed subtrees are not fetched again
    assert_eq!(requests_for(&mock_server, "/2018/index.html").await, 2);
    assert_eq!(requests_for(&mock_server, "/2018/11.html").await, 1);
    assert_eq!(requests_for(&mock_server, "/2018/11/01/110101.html").await, 1);
}

#[tokio::test]
async fn test_resume_after_server_errors() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server, &["/2018/12.html"]).await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    let report = crawl(create_test_config(&mock_server, &db, Level::District))
        .await
        .expect("Crawl aborted");

    assert_eq!(report.failed_nodes(), 1);
    assert!(matches!(
        report.ensure_complete(),
        Err(HarvestError::Incomplete { failed: 1 })
    ));
    assert_eq!(requests_for(&mock_server, "/2018/12.html").await, 2);

    {
        let store = open(&db);
        assert_eq!(expansion(&store, Level::Province, "11"), Expansion::Expanded(1));
        assert_eq!(expansion(&store, Level::Province, "12"), Expansion::NotExpanded);
        assert_eq!(store.list_regions(Level::District, 2018).unwrap().len(), 1);

        let run = store.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Incomplete);
        assert_eq!(run.failed_nodes, 1);
    }

    // The directory recovers; the next run only fetches what is missing
    mock_server.reset().await;
    mount_directory(&mock_server, &[]).await;

    let resumed = crawl(create_test_config(&mock_server, &db, Level::District))
        .await
        .expect("Resumed crawl failed");
    resumed.ensure_complete().unwrap();

    assert_eq!(requests_for(&mock_server, "/2018/11.html").await, 0);
    assert_eq!(requests_for(&mock_server, "/2018/12.html").await, 1);

    let store = open(&db);
    assert_eq!(expansion(&store, Level::Province, "12"), Expansion::Expanded(1));
    assert_eq!(expansion(&store, Level::City, "120100000000"), Expansion::Expanded(0));
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_fail_fast_aborts_run() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server, &["/2018/11.html"]).await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    let mut config = create_test_config(&mock_server, &db, Level::District);
    config.crawler.concurrency = 1;
    config.crawler.fail_fast = true;

    let result = crawl(config).await;

    assert!(matches!(result, Err(HarvestError::Fetch(_))));
    assert_eq!(requests_for(&mock_server, "/2018/12.html").await, 0);

    let store = open(&db);
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Failed
    );
    assert!(store.list_regions(Level::City, 2018).unwrap().is_empty());
}

/// Answers the index after `delay`, which outlasts a 200 ms navigation timeout
fn slow_index(delay: Duration) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(INDEX)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_delay(delay)
}

#[tokio::test]
async fn test_navigation_timeout_exhausts_retries() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2018/index.html"))
        .respond_with(slow_index(Duration::from_millis(800)))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    let mut config = create_test_config(&mock_server, &db, Level::Province);
    config.crawler.timeout_ms = 200;
    config.crawler.max_attempts = 3;
    config.crawler.fail_fast = true;

    let result = crawl(config).await;

    match result {
        Err(HarvestError::Fetch(FetchError::Exhausted { attempts, last, .. })) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::Timeout { .. }), "last error {:?}", last);
        }
        other => panic!("expected exhausted timeouts, got {:?}", other),
    }
    assert_eq!(requests_for(&mock_server, "/2018/index.html").await, 3);
    assert!(open(&db).list_regions(Level::Province, 2018).unwrap().is_empty());
}

#[tokio::test]
async fn test_navigation_timeout_reported_without_fail_fast() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2018/index.html"))
        .respond_with(slow_index(Duration::from_millis(800)))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    let mut config = create_test_config(&mock_server, &db, Level::Province);
    config.crawler.timeout_ms = 200;
    config.crawler.max_attempts = 3;

    let report = crawl(config).await.expect("Crawl aborted");

    let failed = &report.level(Level::Province).unwrap().failed;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].url, format!("{}/2018/index.html", mock_server.uri()));
    assert!(failed[0].error.contains("after 3 attempt(s)"), "{}", failed[0].error);
    assert!(failed[0].error.contains("Request timeout"), "{}", failed[0].error);
    assert!(matches!(
        report.ensure_complete(),
        Err(HarvestError::Incomplete { failed: 1 })
    ));
    assert_eq!(requests_for(&mock_server, "/2018/index.html").await, 3);
}

#[tokio::test]
async fn test_retry_after_navigation_timeout_succeeds() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2018/index.html"))
        .respond_with(slow_index(Duration::from_millis(800)))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_directory(&mock_server, &[]).await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    let mut config = create_test_config(&mock_server, &db, Level::Province);
    config.crawler.timeout_ms = 200;
    config.crawler.max_attempts = 3;

    let report = crawl(config).await.expect("Crawl failed");

    assert_eq!(report.failed_nodes(), 0);
    assert_eq!(requests_for(&mock_server, "/2018/index.html").await, 2);
    assert_eq!(
        open(&db).list_regions(Level::Province, 2018).unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_province_only_depth() {
    let mock_server = MockServer::start().await;
    mount_directory(&mock_server, &[]).await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    crawl(create_test_config(&mock_server, &db, Level::Province))
        .await
        .expect("Crawl failed");

    let store = open(&db);
    let provinces: Vec<_> = store
        .list_regions(Level::Province, 2018)
        .unwrap()
        .into_iter()
        .map(|p| (p.code, p.name, p.expansion))
        .collect();

    assert_eq!(
        provinces,
        vec![
            ("11".to_string(), "北京市".to_string(), Expansion::NotExpanded),
            ("12".to_string(), "天津市".to_string(), Expansion::NotExpanded),
        ]
    );
    assert_eq!(requests_for(&mock_server, "/2018/11.html").await, 0);
}

#[tokio::test]
async fn test_gbk_pages_without_declared_charset() {
    let mock_server = MockServer::start().await;

    // "北京市" in GBK
    let mut body = b"<table><tr class='provincetr'><td><a href='11.html'>".to_vec();
    body.extend_from_slice(&[0xB1, 0xB1, 0xBE, 0xA9, 0xCA, 0xD0]);
    body.extend_from_slice(b"</a></td></tr></table>");

    Mock::given(method("GET"))
        .and(path("/2018/index.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/html"),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    crawl(create_test_config(&mock_server, &db, Level::Province))
        .await
        .expect("Crawl failed");

    let store = open(&db);
    let provinces = store.list_regions(Level::Province, 2018).unwrap();
    assert_eq!(provinces.len(), 1);
    assert_eq!(provinces[0].name, "北京市");
}
