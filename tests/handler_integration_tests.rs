use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use buzz_breeze::{
    AppConfig, AppState, FixedClock, MemoryRepository, TokenCodec,
    clock::ClockState,
    config::Env,
    create_router,
    models::{Role, User},
    repository::{DirectoryState, Repository, RepositoryState, UserDirectory},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const NOW: i64 = 1_700_000_000;
const ADMIN_EMAIL: &str = "admin@x.com";
const ALICE: &str = "alice@x.com";
const BOB: &str = "bob@x.com";

struct TestApp {
    router: Router,
    store: Arc<MemoryRepository>,
    codec: TokenCodec,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryRepository::new());
        store.insert_user(User::new(ADMIN_EMAIL, Role::Admin)).await.unwrap();
        Self::build(store.clone(), store as RepositoryState)
    }

    /// The admin directory works, but every collection call fails.
    async fn with_failing_repository() -> Self {
        let directory = Arc::new(MemoryRepository::new());
        directory.insert_user(User::new(ADMIN_EMAIL, Role::Admin)).await.unwrap();
        Self::build(directory, Arc::new(MemoryRepository::new_failing()) as RepositoryState)
    }

    fn build(directory: Arc<MemoryRepository>, repo: RepositoryState) -> Self {
        let clock = Arc::new(FixedClock::new(NOW)) as ClockState;
        let config = AppConfig::new(Env::Local, TEST_JWT_SECRET);
        let state = AppState::new(config, repo, directory.clone() as DirectoryState, clock);
        let codec = state.codec.clone();

        Self {
            router: create_router(state),
            store: directory,
            codec,
        }
    }

    fn cookie(&self, email: &str) -> String {
        let principal = self.codec.principal_for(email, NOW);
        format!("token={}", self.codec.issue(&principal).unwrap())
    }

    async fn call(&self, method: Method, uri: &str, as_user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(email) = as_user {
            builder = builder.header(header::COOKIE, self.cookie(email));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn add_post(&self, author: &str, title: &str, tags: &[&str]) -> Value {
        let (status, post) = self
            .call(
                Method::POST,
                "/addPost",
                Some(author),
                Some(json!({
                    "authorName": author,
                    "title": title,
                    "description": format!("about {title}"),
                    "tags": tags,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        post
    }
}

fn titles(posts: &Value) -> Vec<&str> {
    posts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect()
}

// --- Public Surface ---

#[tokio::test]
async fn test_banner_and_health() {
    let app = TestApp::new().await;

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_without_session_succeeds() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/logout", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
}

// --- Users ---

#[tokio::test]
async fn test_upsert_user_creates_ordinary_then_returns_existing() {
    let app = TestApp::new().await;

    let (status, user) = app
        .call(
            Method::PUT,
            "/user",
            None,
            Some(json!({ "email": ALICE, "name": "Alice", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "ordinary");
    assert_eq!(user["name"], "Alice");

    // A later sign-in does not overwrite the stored record.
    let (_, again) = app
        .call(Method::PUT, "/user", None, Some(json!({ "email": ALICE, "name": "Changed" })))
        .await;
    assert_eq!(again["name"], "Alice");
    assert_eq!(again["role"], "ordinary");
}

#[tokio::test]
async fn test_upsert_user_membership_request_sets_status() {
    let app = TestApp::new().await;
    app.call(Method::PUT, "/user", None, Some(json!({ "email": ALICE })))
        .await;

    let (status, user) = app
        .call(
            Method::PUT,
            "/user",
            None,
            Some(json!({ "email": ALICE, "status": "Requested" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["status"], "Requested");
    assert_eq!(user["role"], "ordinary");
}

#[tokio::test]
async fn test_upsert_user_requires_email() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(Method::PUT, "/user", None, Some(json!({ "email": "" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "bad_request");
}

#[tokio::test]
async fn test_membership_update_on_own_record() {
    let app = TestApp::new().await;
    app.call(Method::PUT, "/user", None, Some(json!({ "email": ALICE })))
        .await;

    let (status, user) = app
        .call(
            Method::PATCH,
            "/user",
            Some(ALICE),
            Some(json!({
                "email": ALICE,
                "status": "Member",
                "badge": "gold",
                "transactionId": "txn_123",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["badge"], "gold");
    assert_eq!(user["transactionId"], "txn_123");
    assert_eq!(user["role"], "ordinary");
}

#[tokio::test]
async fn test_membership_update_without_record_is_not_found() {
    let app = TestApp::new().await;

    let (status, _) = app
        .call(Method::PATCH, "/user", Some(ALICE), Some(json!({ "email": ALICE })))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_manages_users() {
    let app = TestApp::new().await;
    app.call(Method::PUT, "/user", None, Some(json!({ "email": ALICE })))
        .await;

    let (status, users) = app.call(Method::GET, "/users", Some(ADMIN_EMAIL), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let (_, count) = app.call(Method::GET, "/usersCount", Some(ADMIN_EMAIL), None).await;
    assert_eq!(count, json!({ "count": 2 }));

    let (status, promoted) = app
        .call(
            Method::PATCH,
            "/users/update/alice@x.com",
            Some(ADMIN_EMAIL),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "admin");

    // Alice's existing session is now enough for the admin tier.
    let (status, _) = app.call(Method::GET, "/users", Some(ALICE), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::PATCH,
            "/users/update/nobody@x.com",
            Some(ADMIN_EMAIL),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Posts ---

#[tokio::test]
async fn test_add_post_takes_author_from_session() {
    let app = TestApp::new().await;

    let (status, post) = app
        .call(
            Method::POST,
            "/addPost",
            Some(ALICE),
            Some(json!({
                "email": BOB,
                "authorName": "Alice",
                "title": "first",
                "description": "hello",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["email"], ALICE);
    assert_eq!(post["upvote"], 0);
    assert_eq!(post["tags"], json!([]));
}

#[tokio::test]
async fn test_add_post_requires_title() {
    let app = TestApp::new().await;

    let (status, _) = app
        .call(
            Method::POST,
            "/addPost",
            Some(ALICE),
            Some(json!({ "authorName": "Alice", "title": " ", "description": "x" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_posts_filters_and_pages() {
    let app = TestApp::new().await;
    app.add_post(ALICE, "one", &["rust"]).await;
    app.add_post(BOB, "two", &["go"]).await;
    app.add_post(ALICE, "three", &["rust", "web"]).await;

    let (_, all) = app.call(Method::GET, "/posts", None, None).await;
    assert_eq!(titles(&all), vec!["three", "two", "one"]);

    let (_, rust) = app.call(Method::GET, "/posts?tags=rust", None, None).await;
    assert_eq!(titles(&rust), vec!["three", "one"]);

    let (_, unfiltered) = app.call(Method::GET, "/posts?tags=null", None, None).await;
    assert_eq!(titles(&unfiltered).len(), 3);

    let (_, second_page) = app
        .call(Method::GET, "/posts?page=1&size=2", None, None)
        .await;
    assert_eq!(titles(&second_page), vec!["one"]);

    let (_, count) = app.call(Method::GET, "/postsCount", None, None).await;
    assert_eq!(count, json!({ "count": 3 }));
}

#[tokio::test]
async fn test_my_posts_and_count() {
    let app = TestApp::new().await;
    app.add_post(ALICE, "one", &[]).await;
    app.add_post(BOB, "two", &[]).await;
    app.add_post(ALICE, "three", &[]).await;

    let (status, mine) = app
        .call(Method::GET, "/myPosts/alice@x.com?page=0&size=1", Some(ALICE), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&mine), vec!["three"]);

    let (_, count) = app
        .call(Method::GET, "/myPostsCount/alice@x.com", Some(ALICE), None)
        .await;
    assert_eq!(count, json!({ "count": 2 }));
}

#[tokio::test]
async fn test_get_post_and_missing_post() {
    let app = TestApp::new().await;
    let post = app.add_post(ALICE, "one", &[]).await;
    let id = post["id"].as_str().unwrap();

    let (status, fetched) = app.call(Method::GET, &format!("/post/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, post);

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app
        .call(Method::GET, &format!("/post/{missing}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "not_found");
}

#[tokio::test]
async fn test_vote_post() {
    let app = TestApp::new().await;
    let post = app.add_post(ALICE, "one", &[]).await;
    let uri = format!("/post/{}", post["id"].as_str().unwrap());

    let (status, voted) = app
        .call(Method::PATCH, &uri, Some(BOB), Some(json!({ "upvote": 3, "downvote": 1 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(voted["upvote"], 3);
    assert_eq!(voted["downvote"], 1);

    let (status, _) = app
        .call(Method::PATCH, &uri, Some(BOB), Some(json!({ "upvote": -1, "downvote": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Voting needs a session.
    let (status, _) = app
        .call(Method::PATCH, &uri, None, Some(json!({ "upvote": 4, "downvote": 1 })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_post_is_owner_only() {
    let app = TestApp::new().await;
    let post = app.add_post(ALICE, "one", &[]).await;
    let uri = format!("/post/{}", post["id"].as_str().unwrap());

    let (status, body) = app.call(Method::DELETE, &uri, Some(BOB), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted_count": 0 }));

    let (_, body) = app.call(Method::DELETE, &uri, Some(ALICE), None).await;
    assert_eq!(body, json!({ "deleted_count": 1 }));

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Comments & Reports ---

#[tokio::test]
async fn test_comments_and_counts() {
    let app = TestApp::new().await;

    for (title, text) in [("one", "nice"), ("one", "agreed"), ("two", "meh")] {
        let (status, comment) = app
            .call(
                Method::POST,
                "/addComment",
                Some(BOB),
                Some(json!({ "title": title, "comment": text })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(comment["email"], BOB);
    }

    let (_, comments) = app.call(Method::GET, "/comment/one", None, None).await;
    assert_eq!(comments.as_array().unwrap().len(), 2);

    let (_, total) = app.call(Method::GET, "/commentsCount", None, None).await;
    assert_eq!(total, json!({ "count": 3 }));

    let (_, for_post) = app.call(Method::GET, "/myCommentCount/two", None, None).await;
    assert_eq!(for_post, json!({ "count": 1 }));
}

#[tokio::test]
async fn test_reports_flow_to_admin() {
    let app = TestApp::new().await;

    let (status, report) = app
        .call(
            Method::POST,
            "/addReport",
            Some(ALICE),
            Some(json!({ "commenterEmail": BOB, "comment": "meh", "feedback": "rude" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["reporterEmail"], ALICE);

    let (status, _) = app.call(Method::GET, "/reports", Some(ALICE), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, reports) = app.call(Method::GET, "/reports", Some(ADMIN_EMAIL), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reports.as_array().unwrap().len(), 1);
    assert_eq!(reports[0]["feedback"], "rude");
}

// --- Tags & Announcements ---

#[tokio::test]
async fn test_admin_adds_tags() {
    let app = TestApp::new().await;

    let (status, _) = app
        .call(Method::POST, "/addTags", Some(ALICE), Some(json!({ "name": "rust" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    for name in ["web", "rust"] {
        let (status, _) = app
            .call(Method::POST, "/addTags", Some(ADMIN_EMAIL), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, tags) = app.call(Method::GET, "/tags", None, None).await;
    let names: Vec<&str> = tags
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["rust", "web"]);
}

#[tokio::test]
async fn test_admin_adds_announcements() {
    let app = TestApp::new().await;
    let body = json!({
        "authorName": "Admin",
        "title": "Welcome",
        "description": "Be nice",
    });

    let (status, _) = app
        .call(Method::POST, "/addAnnouncement", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = app
        .call(Method::POST, "/addAnnouncement", Some(ADMIN_EMAIL), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["title"], "Welcome");

    let (_, list) = app.call(Method::GET, "/announcements", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, count) = app.call(Method::GET, "/announcementsCount", None, None).await;
    assert_eq!(count, json!({ "count": 1 }));
}

// --- Failures ---

#[tokio::test]
async fn test_repository_failure_is_opaque_server_error() {
    let app = TestApp::with_failing_repository().await;

    let (status, body) = app.call(Method::GET, "/posts", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "message": "internal server error", "error_code": "internal_error" })
    );

    // The admin gate passes on the working directory; the handler then fails.
    let (status, _) = app.call(Method::GET, "/users", Some(ADMIN_EMAIL), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.store.find_user(ADMIN_EMAIL).await.unwrap().is_some());
}
