use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use forumbridge_backend::api::{self, AppState};
use forumbridge_backend::bootstrap;
use forumbridge_backend::config::{BridgeConfig, BridgePaths, FeedConfig, SlackConfig};
use forumbridge_backend::feed::HttpFeedClient;
use forumbridge_backend::identity::AvatarDirectory;
use forumbridge_backend::mirror::MirrorEngine;
use forumbridge_backend::sink::SlackClient;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;

#[derive(Clone)]
struct FeedState {
    body: Arc<Mutex<Value>>,
    status: Arc<Mutex<StatusCode>>,
    auth: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone, Default)]
struct SlackState {
    posts: Arc<Mutex<Vec<Value>>>,
}

async fn feed_handler(State(state): State<FeedState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.auth.lock().unwrap().push(auth.to_string());
    }
    let status = *state.status.lock().unwrap();
    let body = state.body.lock().unwrap().clone();
    (status, Json(body))
}

async fn post_message_handler(State(state): State<SlackState>, Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    if text.contains("BLOCKED") {
        return Json(json!({"ok": false, "error": "msg_blocked"}));
    }
    let mut posts = state.posts.lock().unwrap();
    posts.push(body);
    Json(json!({"ok": true, "ts": format!("1700000000.{:06}", posts.len())}))
}

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

fn feed_snapshot(third_topic_content: &str) -> Value {
    json!({
        "topics": [
            {
                "id": 1,
                "subject": "Welcome thread",
                "authorName": "Chris Nicholson",
                "content": "<p>Say <strong>hi</strong></p>",
                "createdAt": "2024-03-01T10:00:00Z",
                "deletedAt": null,
                "replies": [
                    {"id": 12, "authorName": "Ana", "content": "<p>second</p>",
                     "createdAt": "2024-03-01T10:20:00Z"},
                    {"id": 11, "authorName": "chris nicholson", "content": "<p>first</p>",
                     "createdAt": "2024-03-01T10:10:00Z"},
                    {"id": 13, "authorName": "Ana", "content": "<p>removed</p>",
                     "createdAt": "2024-03-01T10:15:00Z", "deletedAt": "2024-03-01T11:00:00Z"}
                ]
            },
            {
                "id": 2,
                "subject": "Spam",
                "authorName": "Bot",
                "content": "buy now",
                "createdAt": "2024-03-01T09:00:00Z",
                "deletedAt": "2024-03-01T09:30:00Z",
                "replies": []
            },
            {
                "id": 3,
                "subject": "Release notes",
                "authorName": "Dana",
                "content": third_topic_content,
                "createdAt": "2024-03-02T08:00:00Z",
                "replies": [
                    {"id": 31, "authorName": "Ana", "content": "nice",
                     "createdAt": "2024-03-02T08:30:00Z"}
                ]
            }
        ]
    })
}

struct Bridge {
    _dir: TempDir,
    base_url: String,
    feed: FeedState,
    slack: SlackState,
}

async fn start_bridge() -> Bridge {
    let feed = FeedState {
        body: Arc::new(Mutex::new(feed_snapshot("BLOCKED until reviewed"))),
        status: Arc::new(Mutex::new(StatusCode::OK)),
        auth: Arc::new(Mutex::new(Vec::new())),
    };
    let feed_url = spawn(
        Router::new()
            .route("/feed", get(feed_handler))
            .with_state(feed.clone()),
    )
    .await;

    let slack = SlackState::default();
    let slack_url = spawn(
        Router::new()
            .route("/chat.postMessage", post(post_message_handler))
            .with_state(slack.clone()),
    )
    .await;

    let dir = tempdir().expect("tempdir");
    let config = BridgeConfig::new(
        0,
        BridgePaths::from_base_dir(dir.path()).expect("paths"),
        FeedConfig {
            url: format!("{feed_url}/feed"),
            token: Some("feed-secret".into()),
        },
        SlackConfig {
            api_base: slack_url,
            token: "xoxb-test".into(),
            channel: "C0MIRROR".into(),
        },
    );
    let resources = bootstrap::initialize(&config).await.expect("bootstrap");

    let http = reqwest::Client::new();
    let engine = MirrorEngine::new(
        Arc::new(HttpFeedClient::new(config.feed.clone(), http.clone())),
        Arc::new(resources.database.clone()),
        Arc::new(SlackClient::new(config.slack.clone(), http)),
        Arc::new(AvatarDirectory::new([(
            "Chris Nicholson",
            "https://cdn.example.com/chris.png",
        )])),
    );
    let state = AppState {
        engine,
        database: resources.database,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind api");
    let addr = listener.local_addr().expect("api addr");
    tokio::spawn(async move {
        let _ = api::serve_on(listener, state).await;
    });

    Bridge {
        _dir: dir,
        base_url: format!("http://{addr}"),
        feed,
        slack,
    }
}

async fn trigger_sync(base_url: &str) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{base_url}/sync"))
        .send()
        .await
        .expect("sync request");
    let status = response.status();
    let body = response.json::<Value>().await.expect("sync json");
    (status, body)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manual_sync_mirrors_once_and_retries_failures() {
    let bridge = start_bridge().await;

    let (status, first) = trigger_sync(&bridge.base_url).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], json!(false));
    assert_eq!(first["new_topic_count"], json!(1));
    assert_eq!(first["new_reply_count"], json!(2));
    let errors = first["errors"].as_array().expect("errors");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("Release notes"));
    assert!(errors[0].as_str().unwrap().contains("msg_blocked"));

    {
        let posts = bridge.slack.posts.lock().unwrap();
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0]["channel"], json!("C0MIRROR"));
        assert_eq!(posts[0]["text"], json!("Welcome thread\n\nSay *hi*"));
        assert!(posts[0].get("thread_ts").is_none());
        assert_eq!(posts[0]["icon_url"], json!("https://cdn.example.com/chris.png"));

        assert_eq!(posts[1]["text"], json!("first"));
        assert_eq!(posts[1]["thread_ts"], json!("1700000000.000001"));
        assert_eq!(posts[1]["username"], json!("chris nicholson"));
        assert_eq!(posts[1]["icon_url"], json!("https://cdn.example.com/chris.png"));
        assert_eq!(posts[2]["text"], json!("second"));
        assert!(posts[2].get("icon_url").is_none());
    }
    assert!(bridge
        .feed
        .auth
        .lock()
        .unwrap()
        .iter()
        .all(|auth| auth == "Bearer feed-secret"));

    let (_, second) = trigger_sync(&bridge.base_url).await;
    assert_eq!(second["new_topic_count"], json!(0));
    assert_eq!(second["new_reply_count"], json!(0));
    assert_eq!(second["errors"].as_array().unwrap().len(), 1);
    assert_eq!(bridge.slack.posts.lock().unwrap().len(), 3);

    *bridge.feed.body.lock().unwrap() = feed_snapshot("<p>Shipped today</p>");
    let (_, third) = trigger_sync(&bridge.base_url).await;
    assert_eq!(third["success"], json!(true));
    assert_eq!(third["new_topic_count"], json!(1));
    assert_eq!(third["new_reply_count"], json!(1));

    let status: Value = reqwest::Client::new()
        .get(format!("{}/status", bridge.base_url))
        .send()
        .await
        .expect("status request")
        .json()
        .await
        .expect("status json");
    assert_eq!(status["mirrored_topics"], json!(2));
    assert_eq!(status["mirrored_replies"], json!(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn feed_outage_fails_the_whole_pass() {
    let bridge = start_bridge().await;
    *bridge.feed.status.lock().unwrap() = StatusCode::SERVICE_UNAVAILABLE;

    let (status, body) = trigger_sync(&bridge.base_url).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["message"].as_str().unwrap().contains("503"));
    assert!(bridge.slack.posts.lock().unwrap().is_empty());

    let health: Value = reqwest::Client::new()
        .get(format!("{}/health", bridge.base_url))
        .send()
        .await
        .expect("health request")
        .json()
        .await
        .expect("health json");
    assert_eq!(health["status"], json!("ok"));
}
