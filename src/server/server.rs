use anyhow::{Context, Result};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::catalog_store::CatalogStore;
use crate::config::StatsSettings;
use crate::stats::StatsEngine;
use crate::user::{FullUserStore, TierSubmission, UserContentError, UserManager};
use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::admin_routes::admin_routes;
use super::metrics::{metrics_handler, record_error, record_login_attempt, record_submission};
use super::stats_routes::stats_routes;
use super::{log_requests, state::*, ServerConfig};
use crate::server::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use crate::user::Permission;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub logged_in: bool,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(super) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Logs a store failure and turns it into a bare 500.
pub(super) fn internal_error(endpoint: &str, err: anyhow::Error) -> Response {
    error!("{} failed: {:#}", endpoint, err);
    record_error("store", endpoint);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

fn user_content_error_response(endpoint: &str, err: UserContentError) -> Response {
    match err {
        UserContentError::Validation(message) => error_response(StatusCode::BAD_REQUEST, message),
        UserContentError::NotFound(what) => {
            error_response(StatusCode::NOT_FOUND, format!("{} not found", what))
        }
        UserContentError::Store(err) => internal_error(endpoint, err),
    }
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub user_handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    pub user_handle: String,
    pub mail: String,
    pub password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    user_id: usize,
}

#[derive(Deserialize, Debug)]
struct SongSearchQuery {
    q: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ReviewBody {
    pub rating: i64,
    pub comments: String,
}

#[derive(Deserialize, Debug)]
struct TierListBody {
    pub tiers: TierSubmission,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    Json(ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        logged_in: session.is_some(),
    })
}

// =============================================================================
// Auth
// =============================================================================

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<LoginBody>,
) -> Response {
    debug!("login() called for {}", body.user_handle);
    let start = Instant::now();
    let result = user_manager
        .lock()
        .unwrap()
        .login(&body.user_handle, &body.password);

    match result {
        Ok(Some(auth_token)) => {
            record_login_attempt("success", start.elapsed());
            let cookie = format!(
                "{}={}; Path=/; HttpOnly",
                COOKIE_SESSION_TOKEN_KEY, auth_token.value.0
            );
            let Ok(cookie_value) = HeaderValue::from_str(&cookie) else {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            };
            (
                StatusCode::CREATED,
                [(header::SET_COOKIE, cookie_value)],
                Json(LoginSuccessResponse {
                    token: auth_token.value.0,
                }),
            )
                .into_response()
        }
        Ok(None) => {
            record_login_attempt("failure", start.elapsed());
            StatusCode::FORBIDDEN.into_response()
        }
        Err(err) => {
            record_login_attempt("error", start.elapsed());
            internal_error("login", err)
        }
    }
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    let result = user_manager
        .lock()
        .unwrap()
        .delete_auth_token(session.user_id, &session.token);
    match result {
        Ok(()) => {
            let cookie = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
                .same_site(SameSite::Lax)
                .build();
            (StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]).into_response()
        }
        Err(err) => {
            debug!("Logout failed: {}", err);
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<RegisterBody>,
) -> Response {
    let result = user_manager
        .lock()
        .unwrap()
        .register(&body.user_handle, &body.mail, &body.password);
    match result {
        Ok(user_id) => (StatusCode::CREATED, Json(RegisterResponse { user_id })).into_response(),
        Err(err) => user_content_error_response("register", err),
    }
}

// =============================================================================
// Catalog
// =============================================================================

async fn list_songs(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
    Query(query): Query<SongSearchQuery>,
) -> Response {
    if !session.has_permission(Permission::AccessCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let query = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    match catalog_store.list_songs(query) {
        Ok(songs) => Json(songs).into_response(),
        Err(err) => internal_error("list_songs", err),
    }
}

async fn get_song(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Path(code): Path<i64>,
) -> Response {
    if !session.has_permission(Permission::AccessCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let result = user_manager
        .lock()
        .unwrap()
        .get_song_detail(session.user_id, code);
    match result {
        Ok(detail) => Json(detail).into_response(),
        Err(err) => user_content_error_response("get_song", err),
    }
}

async fn list_categories(
    session: Session,
    State(catalog_store): State<GuardedCatalogStore>,
) -> Response {
    if !session.has_permission(Permission::AccessCatalog) {
        return StatusCode::FORBIDDEN.into_response();
    }
    match catalog_store.list_categories() {
        Ok(categories) => Json(categories).into_response(),
        Err(err) => internal_error("list_categories", err),
    }
}

// =============================================================================
// Reviews and rankings
// =============================================================================

async fn put_review(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Path(code): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Response {
    if !session.has_permission(Permission::WriteReviews) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let result = user_manager.lock().unwrap().submit_review(
        session.user_id,
        code,
        body.rating,
        &body.comments,
    );
    match result {
        Ok(review) => {
            record_submission("review", "saved");
            Json(review).into_response()
        }
        Err(err) => {
            record_submission("review", "rejected");
            user_content_error_response("put_review", err)
        }
    }
}

async fn get_ranking(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Path(category_code): Path<i64>,
) -> Response {
    if !session.has_permission(Permission::RankSongs) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let result = user_manager
        .lock()
        .unwrap()
        .get_ranking_page(session.user_id, category_code);
    match result {
        Ok(page) => Json(page).into_response(),
        Err(err) => user_content_error_response("get_ranking", err),
    }
}

async fn put_ranking(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Path(category_code): Path<i64>,
    Json(body): Json<TierListBody>,
) -> Response {
    if !session.has_permission(Permission::RankSongs) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let result =
        user_manager
            .lock()
            .unwrap()
            .save_tier_list(session.user_id, category_code, &body.tiers);
    match result {
        Ok(saved_tiers) => {
            record_submission("ranking", "saved");
            Json(saved_tiers).into_response()
        }
        Err(err) => {
            record_submission("ranking", "rejected");
            user_content_error_response("put_ranking", err)
        }
    }
}

// =============================================================================
// App
// =============================================================================

impl ServerState {
    fn new(
        config: ServerConfig,
        catalog_store: Arc<dyn CatalogStore>,
        user_store: Arc<dyn FullUserStore>,
        stats_settings: StatsSettings,
    ) -> ServerState {
        let user_manager = UserManager::new(catalog_store.clone(), user_store.clone());
        let stats_engine = StatsEngine::new(catalog_store.clone(), user_store, stats_settings);
        ServerState {
            config,
            start_time: Instant::now(),
            catalog_store,
            user_manager: Arc::new(Mutex::new(user_manager)),
            stats_engine: Arc::new(stats_engine),
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    catalog_store: Arc<dyn CatalogStore>,
    user_store: Arc<dyn FullUserStore>,
    stats_settings: StatsSettings,
) -> Result<Router> {
    let state = ServerState::new(config.clone(), catalog_store, user_store, stats_settings);

    let auth_routes: Router = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/register", post(register))
        .with_state(state.clone());

    let catalog_routes: Router = Router::new()
        .route("/songs", get(list_songs))
        .route("/songs/{code}", get(get_song))
        .route("/songs/{code}/review", put(put_review))
        .route("/categories", get(list_categories))
        .route("/ranking/{category_code}", get(get_ranking).put(put_ranking))
        .with_state(state.clone());

    let home_router: Router = match &config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)).with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1", catalog_routes)
        .nest("/v1/admin", admin_routes().with_state(state.clone()))
        .nest("/v1/stats", stats_routes().with_state(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(
    config: ServerConfig,
    catalog_store: Arc<dyn CatalogStore>,
    user_store: Arc<dyn FullUserStore>,
    stats_settings: StatsSettings,
) -> Result<()> {
    let app = make_app(config.clone(), catalog_store, user_store, stats_settings)?;

    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", config.metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            warn!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    info!("Listening on {}", listener.local_addr()?);

    Ok(axum::serve(listener, app).await?)
}
