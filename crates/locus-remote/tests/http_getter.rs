//! HTTP strategy against a loopback server.

mod common;

use common::CountingGetter;
use locus_remote::getter::HttpGetter;
use locus_remote::{OsFs, Remote, RemoteError, RetrievalError};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;
use tempfile::TempDir;

/// Serve `connections` requests, answering each with `status` and `body`.
///
/// Returns the base URL and a handle yielding the request lines seen.
fn serve(connections: usize, status: &'static str, body: &'static str) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let mut seen = Vec::new();
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let request = String::from_utf8_lossy(&request).to_string();
            let line = request.lines().next().unwrap_or_default().to_string();
            let payload = if line.starts_with("HEAD") { "" } else { body };

            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                body.len()
            )
            .unwrap();
            seen.push(line);
        }
        seen
    });

    (base, handle)
}

fn remote_over_http(home: &TempDir) -> Remote {
    let client = reqwest::blocking::Client::builder()
        .no_proxy()
        .build()
        .unwrap();
    let unused = Arc::new(CountingGetter::new());
    Remote::with_getters(
        home.path(),
        Arc::new(OsFs),
        unused.clone(),
        unused,
        Arc::new(HttpGetter::with_client(client)),
    )
}

#[test]
fn test_downloads_single_file() {
    let (base, server) = serve(2, "200 OK", "replicas: 3\n");
    let home = TempDir::new().unwrap();
    let remote = remote_over_http(&home);

    let path = remote
        .fetch(&format!("{base}/charts/values.yaml"), None)
        .unwrap();

    assert!(path.starts_with(home.path()));
    assert_eq!(path.file_name().unwrap(), "values.yaml");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "replicas: 3\n");

    let seen = server.join().unwrap();
    assert!(seen[0].starts_with("HEAD /charts/values.yaml"));
    assert!(seen[1].starts_with("GET /charts/values.yaml"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}

#[test]
fn test_missing_file_fails_without_cache_entry() {
    let (base, server) = serve(1, "404 Not Found", "");
    let home = TempDir::new().unwrap();
    let remote = remote_over_http(&home);

    let err = remote
        .fetch(&format!("{base}/charts/missing.yaml"), None)
        .unwrap_err();

    match err {
        RemoteError::Retrieval {
            source: RetrievalError::Http { status, .. },
            ..
        } => assert_eq!(status, 404),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(std::fs::read_dir(home.path()).unwrap().count(), 0);
    server.join().unwrap();
}

#[test]
fn test_encoded_file_name_is_saved_decoded() {
    let (base, server) = serve(2, "200 OK", "name: demo\n");
    let home = TempDir::new().unwrap();
    let remote = remote_over_http(&home);

    let path = remote
        .fetch(&format!("{base}/charts/my file.yaml"), None)
        .unwrap();

    assert_eq!(path.file_name().unwrap(), "my file.yaml");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "name: demo\n");

    let seen = server.join().unwrap();
    assert!(seen[1].starts_with("GET /charts/my%20file.yaml"));
}
