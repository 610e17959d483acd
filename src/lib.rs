use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Routers grouped by access tier (public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{AuthError, Principal, TokenCodec, TokenError};
pub use clock::{Clock, ClockState, FixedClock, SystemClock};
pub use config::{AppConfig, Env};
pub use repository::{
    DirectoryState, MemoryRepository, PostgresRepository, Repository, RepositoryState,
    UserDirectory,
};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::issue_token, handlers::logout, handlers::upsert_user,
        handlers::update_membership, handlers::get_user, handlers::list_users,
        handlers::update_user, handlers::count_users, handlers::add_tag, handlers::list_tags,
        handlers::add_announcement, handlers::list_announcements, handlers::count_announcements,
        handlers::add_post, handlers::list_posts, handlers::count_posts, handlers::my_posts,
        handlers::my_posts_count, handlers::get_post, handlers::delete_post, handlers::vote_post,
        handlers::add_comment, handlers::list_comments, handlers::count_comments,
        handlers::count_post_comments, handlers::add_report, handlers::list_reports
    ),
    components(
        schemas(
            models::Role, models::User, models::Post, models::Comment, models::Report,
            models::Tag, models::Announcement, models::IssueRequest, models::UpsertUserRequest,
            models::MembershipUpdate, models::UserUpdate, models::NewPost, models::VoteUpdate,
            models::NewComment, models::NewReport, models::NewTag, models::NewAnnouncement,
            models::SuccessResponse, models::CountResponse, models::DeleteResponse,
        )
    ),
    tags(
        (name = "buzz-breeze", description = "BuzzBreeze forum API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request needs, constructed once at startup and cloned per request.
/// Nothing in here is mutated while serving.
#[derive(Clone)]
pub struct AppState {
    /// Collection persistence for the handlers.
    pub repo: RepositoryState,
    /// Role lookups for the admin gate. Usually the same store as `repo`.
    pub directory: DirectoryState,
    /// Signs and verifies session credentials with the configured secret.
    pub codec: TokenCodec,
    pub clock: ClockState,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repo: RepositoryState,
        directory: DirectoryState,
        clock: ClockState,
    ) -> Self {
        let codec = TokenCodec::new(config.jwt_secret.as_bytes(), config.token_ttl);
        Self {
            repo,
            directory,
            codec,
            clock,
            config,
        }
    }

    /// State backed by a single in-memory store serving as both repository and directory.
    pub fn in_memory(config: AppConfig, store: Arc<MemoryRepository>, clock: ClockState) -> Self {
        let repo = store.clone() as RepositoryState;
        let directory = store as DirectoryState;
        Self::new(config, repo, directory, clock)
    }
}

// --- Axum FromRef Extractor Implementations ---

// Handlers and gates pull only the pieces of `AppState` they use.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for DirectoryState {
    fn from_ref(app_state: &AppState) -> DirectoryState {
        app_state.directory.clone()
    }
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(app_state: &AppState) -> TokenCodec {
        app_state.codec.clone()
    }
}

impl FromRef<AppState> for ClockState {
    fn from_ref(app_state: &AppState) -> ClockState {
        app_state.clock.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the three access tiers, the docs, and the observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Layers added later run first: `require_auth` binds the principal before
    // `require_admin` reads it.
    let admin_router = admin::admin_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    let authenticated_router = authenticated::authenticated_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated_router)
        .merge(admin_router)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Credentialed CORS: the session cookie only travels to explicitly listed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// trace_span_logger
///
/// Span for each request, tagged with its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
