use std::fs::File;
use std::future::IntoFuture;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;

use packserve::{ServeConfig, ServeMode, server};
use reqwest::StatusCode;
use zip::write::SimpleFileOptions;

const INDEX: &str = "<!DOCTYPE html><html><body>hello</body></html>";

fn binary_blob() -> Vec<u8> {
    (0..=255u8).cycle().take(1000).collect()
}

fn write_zip(path: &Path) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let mtime = zip::DateTime::from_date_and_time(2022, 2, 2, 12, 0, 0).unwrap();
    let options = SimpleFileOptions::default().last_modified_time(mtime);

    zip.start_file("index.html", options).unwrap();
    zip.write_all(INDEX.as_bytes()).unwrap();
    zip.start_file("data/blob.bin", options).unwrap();
    zip.write_all(&binary_blob()).unwrap();
    zip.finish().unwrap();
}

async fn spawn(config: ServeConfig) -> SocketAddr {
    let app = server::router(&config).await.unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, app).into_future());
    addr
}

async fn spawn_zip(dir: &Path) -> SocketAddr {
    let archive = dir.join("site.zip");
    write_zip(&archive);
    spawn(ServeConfig::new(ServeMode::Archive, archive)).await
}

#[tokio::test]
async fn serves_members_from_memory() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_zip(dir.path()).await;

    // The archive is no longer needed once loaded
    std::fs::remove_file(dir.path().join("site.zip")).unwrap();

    let resp = reqwest::get(format!("http://{addr}/index.html")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers().clone();
    assert_eq!(headers["content-type"], "text/html; charset=utf-8");
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(headers["last-modified"], "Wed, 02 Feb 2022 12:00:00 GMT");
    assert_eq!(headers["content-length"], INDEX.len().to_string().as_str());
    assert_eq!(resp.text().await.unwrap(), INDEX);

    let resp = reqwest::get(format!("http://{addr}/data/blob.bin")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), binary_blob().as_slice());
}

#[tokio::test]
async fn unknown_path_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_zip(dir.path()).await;

    let resp = reqwest::get(format!("http://{addr}/missing.css")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Store is untouched: known paths still resolve
    let resp = reqwest::get(format!("http://{addr}/index.html")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn conditional_get() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_zip(dir.path()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/index.html");

    let resp = client
        .get(&url)
        .header("If-Modified-Since", "Wed, 02 Feb 2022 12:00:01 GMT")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

    let resp = client
        .get(&url)
        .header("If-Modified-Since", "Wed, 02 Feb 2022 11:59:59 GMT")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn single_and_multi_range() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_zip(dir.path()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/data/blob.bin");
    let blob = binary_blob();

    let resp = client.get(&url).header("Range", "bytes=0-3").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.headers()["content-range"], "bytes 0-3/1000");
    assert_eq!(resp.headers()["content-length"], "4");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &blob[..4]);

    let resp = client
        .get(&url)
        .header("Range", "bytes=10-19,500-509,-5")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    let boundary = content_type
        .strip_prefix("multipart/byteranges; boundary=")
        .unwrap()
        .to_string();
    let declared: usize = resp.headers()["content-length"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.len(), declared);

    // Reassemble: each part is headers, blank line, then exactly the range
    let mut reassembled = Vec::new();
    let delimiter = format!("--{boundary}\r\n");
    let mut rest = body.as_ref();
    for (start, end) in [(10usize, 20usize), (500, 510), (995, 1000)] {
        let at = find(rest, delimiter.as_bytes()).unwrap();
        rest = &rest[at + delimiter.len()..];
        let blank = find(rest, b"\r\n\r\n").unwrap();
        let head = std::str::from_utf8(&rest[..blank]).unwrap();
        assert!(head.contains(&format!("Content-Range: bytes {}-{}/1000", start, end - 1)));
        assert!(head.contains("Content-Type: application/octet-stream"));
        rest = &rest[blank + 4..];
        reassembled.extend_from_slice(&rest[..end - start]);
        rest = &rest[end - start..];
    }
    let expected: Vec<u8> = [&blob[10..20], &blob[500..510], &blob[995..]].concat();
    assert_eq!(reassembled, expected);
    assert_eq!(rest, format!("\r\n--{boundary}--\r\n").as_bytes());
}

#[tokio::test]
async fn malformed_range_is_416() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_zip(dir.path()).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/index.html"))
        .header("Range", "bytes=5000-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(resp.text().await.unwrap(), "invalid range\n");
}

#[tokio::test]
async fn percent_encoded_paths_are_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("spaced.tar.gz");
    let mut tar = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(2);
    header.set_mode(0o644);
    header.set_mtime(1_700_000_000);
    tar.append_data(&mut header, "my file.txt", &b"ok"[..]).unwrap();
    let mut gz = flate2::write::GzEncoder::new(
        File::create(&archive).unwrap(),
        flate2::Compression::fast(),
    );
    gz.write_all(&tar.into_inner().unwrap()).unwrap();
    gz.finish().unwrap();

    let addr = spawn(ServeConfig::new(ServeMode::Archive, archive)).await;
    let resp = reqwest::get(format!("http://{addr}/my%20file.txt")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn directory_mode_serves_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let site = dir.path().join("site");
    std::fs::create_dir(&site).unwrap();
    std::fs::write(site.join("hello.txt"), "from disk").unwrap();

    let addr = spawn(ServeConfig::new(
        ServeMode::Directory,
        dir.path().join("site.tar.bz2"),
    ))
    .await;
    let resp = reqwest::get(format!("http://{addr}/hello.txt")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "from disk");
}

#[tokio::test]
async fn broken_archive_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("site.zip");
    std::fs::write(&archive, b"PK but not really").unwrap();

    let config = ServeConfig::new(ServeMode::Archive, archive);
    assert!(server::router(&config).await.is_err());
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
