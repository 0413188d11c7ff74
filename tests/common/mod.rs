//! Common test utilities and helpers
//!
//! A fake catalog served over loopback HTTP and shortcuts for seeding a
//! data directory with snapshot files.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use whostream_core::types::{CategoryId, Observation, UserId};
use whostream_store::ObservationStore;

/// Category every fake catalog knows about
pub const GAME_ID: &str = "509658";
pub const GAME_NAME: &str = "Just Chatting";

/// What the responder does with one request
pub enum Reply {
    Json(u16, String),
    Bytes(u16, Vec<u8>),
}

type Handler = Arc<dyn Fn(&str, &str) -> Reply + Send + Sync>;

/// Minimal HTTP/1.1 server recording each request head (lowercased)
///
/// The handler receives the request head and the server's base URL.
pub struct Responder {
    pub base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Responder {
    pub async fn start(handler: impl Fn(&str, &str) -> Reply + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let recorded = Arc::clone(&requests);
        let server_base = base.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let handler = Arc::clone(&handler);
                let recorded = Arc::clone(&recorded);
                let base = server_base.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf).to_lowercase();
                    recorded.lock().unwrap().push(head.clone());

                    let (status, content_type, body) = match handler(&head, &base) {
                        Reply::Json(status, body) => (status, "application/json", body.into_bytes()),
                        Reply::Bytes(status, body) => (status, "image/jpeg", body),
                    };
                    let head = format!(
                        "HTTP/1.1 {status} Whatever\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { base, requests }
    }

    pub fn api_base(&self) -> String {
        format!("{}/helix/", self.base)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.base)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Global CLI arguments pointing the client at this responder
    pub fn cli_args(&self) -> Vec<String> {
        vec![
            "whostream".to_string(),
            "--api-base".to_string(),
            self.api_base(),
            "--token-url".to_string(),
            self.token_url(),
            "--client-id".to_string(),
            "test-client".to_string(),
            "--client-secret".to_string(),
            "test-secret".to_string(),
        ]
    }
}

/// JSON for one live stream of [`GAME_ID`]
pub fn stream_json(base: &str, user: &str, viewers: u64, started_at: &str) -> String {
    format!(
        r#"{{"id":"s{user}","user_id":"{user}","user_login":"user{user}","user_name":"User {user}","game_id":"{GAME_ID}","game_name":"{GAME_NAME}","type":"live","title":"Stream of {user}","viewer_count":{viewers},"started_at":"{started_at}","language":"en","thumbnail_url":"{base}/img/{user}-{{width}}x{{height}}.jpg"}}"#
    )
}

/// Fake catalog: one category, two pages of streams, thumbnails for all
/// but user 3
///
/// Page one lists users 1 and 2; page two lists user 3 and user 2 again
/// with fewer viewers.
pub fn catalog(head: &str, base: &str) -> Reply {
    let started = "2024-03-01T08:00:00Z";
    if head.starts_with("post /oauth2/token") {
        Reply::Json(200, r#"{"access_token":"tok","expires_in":3600,"token_type":"bearer"}"#.into())
    } else if head.starts_with(&format!("get /helix/games?id={GAME_ID} ")) {
        Reply::Json(200, format!(r#"{{"data":[{{"id":"{GAME_ID}","name":"{GAME_NAME}"}}]}}"#))
    } else if head.starts_with("get /helix/games") {
        Reply::Json(200, r#"{"data":[]}"#.into())
    } else if head.starts_with("get /helix/streams") && head.contains("after=page2") {
        Reply::Json(
            200,
            format!(
                r#"{{"data":[{},{}],"pagination":{{}}}}"#,
                stream_json(base, "3", 30, started),
                stream_json(base, "2", 5, started)
            ),
        )
    } else if head.starts_with("get /helix/streams") {
        Reply::Json(
            200,
            format!(
                r#"{{"data":[{},{}],"pagination":{{"cursor":"page2"}}}}"#,
                stream_json(base, "1", 100, started),
                stream_json(base, "2", 20, started)
            ),
        )
    } else if head.starts_with("get /img/3-") {
        Reply::Bytes(404, Vec::new())
    } else if head.starts_with("get /img/") {
        Reply::Bytes(200, b"\xff\xd8\xff\xe0fake-jpeg".to_vec())
    } else {
        Reply::Json(404, r#"{"error":"Not Found"}"#.into())
    }
}

pub fn utc(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
}

pub fn observation(
    user: &str,
    started_at: DateTime<Utc>,
    running_minutes: i64,
    viewers: u64,
) -> Observation {
    Observation::new(
        UserId::new(user),
        format!("user{user}"),
        "en",
        viewers,
        started_at,
        running_minutes,
        format!("Stream of {user}"),
    )
}

/// Write one snapshot per `(run minute, observations)` pair, on 2024-03-01
pub fn seed_snapshots(dir: &Path, category: &str, runs: Vec<((u32, u32), Vec<Observation>)>) {
    let store = ObservationStore::new(dir);
    let category = CategoryId::new(category);
    for ((h, m), observations) in runs {
        store.write(utc(h, m), &category, &observations).unwrap();
    }
}
