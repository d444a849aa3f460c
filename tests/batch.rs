mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use arxiv_digest::downloader::PaperDownloader;
use arxiv_digest::downloader::batch::BatchDownloader;
use arxiv_digest::downloader::core::{Fetch, Fetcher};
use arxiv_digest::downloader::error::ErrorKind;
use arxiv_digest::downloader::models::{DownloadResult, DownloadTask};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{create_test_config, file_names, minimal_pdf, valid_pdf};

async fn mount_pdf(server: &MockServer, route: &str, status: u16, body: Vec<u8>, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
        .expect(expected)
        .mount(server)
        .await;
}

fn tasks(server: &MockServer, ids: &[&str], dir: &std::path::Path) -> Vec<DownloadTask> {
    ids.iter()
        .map(|id| DownloadTask::in_dir(*id, format!("{}/pdf/{}", server.uri(), id), dir))
        .collect()
}

#[tokio::test]
async fn test_partial_failure_keeps_order() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_pdf(&server, "/pdf/p1", 200, valid_pdf(), 1).await;
    mount_pdf(&server, "/pdf/p2", 404, Vec::new(), 2).await;
    mount_pdf(&server, "/pdf/p3", 200, minimal_pdf(3000), 1).await;

    let config = create_test_config(dir.path());
    let batch = BatchDownloader::new(Arc::new(Fetcher::new(&config).unwrap()), 3);
    let report = batch.download_all(tasks(&server, &["p1", "p2", "p3"], dir.path())).await;

    let ids: Vec<_> = report.results.iter().map(|r| r.task.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert!(report.results[0].is_success());
    assert_eq!(report.results[1].error_kind(), Some(ErrorKind::Network));
    assert!(report.results[2].is_success());
    assert_eq!((report.succeeded, report.skipped, report.failed), (2, 0, 1));
    assert_eq!(file_names(dir.path()), vec!["p1.pdf", "p3.pdf"]);
}

#[tokio::test]
async fn test_rerun_makes_no_requests() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    // 两次运行合计每个地址只请求一次
    mount_pdf(&server, "/pdf/a", 200, valid_pdf(), 1).await;
    mount_pdf(&server, "/pdf/b", 200, valid_pdf(), 1).await;

    let config = create_test_config(dir.path());
    let batch = BatchDownloader::new(Arc::new(Fetcher::new(&config).unwrap()), 2);

    let first = batch.download_all(tasks(&server, &["a", "b"], dir.path())).await;
    assert_eq!(first.succeeded, 2);

    let second = batch.download_all(tasks(&server, &["a", "b"], dir.path())).await;
    assert_eq!((second.succeeded, second.skipped, second.failed), (0, 2, 0));
    assert_eq!(second.available().count(), 2);
}

#[tokio::test]
async fn test_empty_task_list() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let batch = BatchDownloader::new(Arc::new(Fetcher::new(&config).unwrap()), 3);
    let report = batch.download_all(Vec::new()).await;
    assert!(report.is_empty());
    assert_eq!((report.succeeded, report.skipped, report.failed), (0, 0, 0));
}

/// 记录同时进行中的任务数
struct CountingFetch {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Fetch for CountingFetch {
    async fn fetch(&self, task: &DownloadTask) -> DownloadResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        DownloadResult::downloaded(task.clone(), 1)
    }
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let fetch = Arc::new(CountingFetch {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let batch = BatchDownloader::new(fetch.clone(), 3);
    let tasks: Vec<_> = (0..12)
        .map(|i| DownloadTask::new(format!("p{i}"), format!("http://example/{i}"), format!("/tmp/p{i}.pdf")))
        .collect();

    let report = batch.download_all(tasks).await;

    assert_eq!(report.succeeded, 12);
    let peak = fetch.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency was {peak}");
    assert!(peak >= 1);
    let ids: Vec<_> = report.results.iter().map(|r| r.task.id.clone()).collect();
    assert_eq!(ids, (0..12).map(|i| format!("p{i}")).collect::<Vec<_>>());
}

/// 发送响应头和一部分内容后不再发送，也不关闭连接
async fn stalling_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let body = valid_pdf();
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body[..body.len() / 2]).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_cancellation_reports_cancelled_and_cleans_temp_files() {
    let dir = TempDir::new().unwrap();
    let base = stalling_server().await;
    let mut config = create_test_config(dir.path());
    config.request_timeout = Duration::from_secs(20);

    let batch = BatchDownloader::new(Arc::new(Fetcher::new(&config).unwrap()), 1);
    let tasks: Vec<_> = ["x1", "x2"]
        .iter()
        .map(|id| DownloadTask::in_dir(*id, format!("{}/pdf/{}", base, id), dir.path()))
        .collect();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let temp = tasks[0].temp_path();
    tokio::spawn(async move {
        // 等第一个任务开始写临时文件
        for _ in 0..100 {
            if temp.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), batch.download_all_until(tasks, cancel))
        .await
        .expect("cancellation should stop the batch promptly");

    assert_eq!(report.failed, 2);
    assert!(report.results.iter().all(|r| r.error_kind() == Some(ErrorKind::Cancelled)));
    assert!(file_names(dir.path()).is_empty(), "left: {:?}", file_names(dir.path()));
}

#[tokio::test]
async fn test_paper_downloader_cleanup_and_list() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let downloader = PaperDownloader::new(&config).unwrap();

    tokio::fs::write(dir.path().join("good.pdf"), valid_pdf()).await.unwrap();
    tokio::fs::write(dir.path().join("bad.pdf"), b"not a pdf").await.unwrap();
    tokio::fs::write(dir.path().join("stale.pdf.part"), b"%PDF-1.4").await.unwrap();
    tokio::fs::write(dir.path().join("notes.txt"), b"keep me").await.unwrap();

    let listed = downloader.list_downloaded().await.unwrap();
    assert_eq!(listed.len(), 2);

    let removed = downloader.cleanup_invalid().await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(file_names(dir.path()), vec!["good.pdf", "notes.txt"]);
}

#[tokio::test]
async fn test_list_missing_data_dir_is_empty() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("absent"));
    let downloader = PaperDownloader::new(&config).unwrap();
    assert!(downloader.list_downloaded().await.unwrap().is_empty());
    assert_eq!(downloader.cleanup_invalid().await.unwrap(), 0);
}
