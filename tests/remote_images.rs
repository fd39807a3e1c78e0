mod common;

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;

use common::png;
use topic_pdf::images::ImageKind;
use topic_pdf::loader::{ImageLoader, LocalImageLoader, RemoteFetcher};

/// Serves one HTTP response on a loopback port and returns its base URL.
fn serve_once(status: &str, body: Vec<u8>, declared_len: Option<usize>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    let status = status.to_string();
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        let mut line = String::new();
        while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            if line == "\r\n" {
                break;
            }
            line.clear();
        }
        let len = declared_len.unwrap_or(body.len());
        let head = format!("HTTP/1.1 {status}\r\nContent-Type: image/png\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n");
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&body);
        let _ = stream.flush();
    });
    (url, handle)
}

fn loader(max_bytes: u64) -> LocalImageLoader {
    let dir = std::env::temp_dir();
    LocalImageLoader::new(dir, Some("https://forum.example/".to_string()))
        .with_remote(RemoteFetcher::new(max_bytes).expect("client"))
}

#[test]
fn image_outside_the_board_is_downloaded() {
    common::init_logging();
    let (url, server) = serve_once("200 OK", png(9, 5), None);

    let loaded = loader(1024 * 1024).fetch(&format!("{url}/pics/remote.png")).expect("downloaded");
    server.join().expect("server");

    assert_eq!((loaded.width, loaded.height), (9, 5));
    assert_eq!(loaded.kind, Some(ImageKind::Png));
}

#[test]
fn download_over_the_size_cap_is_refused() {
    let body = png(64, 64);
    let cap = body.len() as u64 - 1;
    let (url, server) = serve_once("200 OK", body, None);

    assert!(loader(cap).fetch(&format!("{url}/big.png")).is_none());
    server.join().expect("server");
}

#[test]
fn declared_length_over_the_cap_is_refused_before_reading() {
    let (url, server) = serve_once("200 OK", Vec::new(), Some(10_000));

    assert!(loader(1_000).fetch(&format!("{url}/huge.png")).is_none());
    server.join().expect("server");
}

#[test]
fn http_error_status_yields_no_image() {
    let (url, server) = serve_once("404 Not Found", b"missing".to_vec(), None);

    assert!(loader(1024 * 1024).fetch(&format!("{url}/gone.png")).is_none());
    server.join().expect("server");
}

#[test]
fn loader_without_a_fetcher_skips_remote_urls() {
    let plain = LocalImageLoader::new(std::env::temp_dir(), None);
    assert!(plain.fetch("http://127.0.0.1:9/never.png").is_none());
}
