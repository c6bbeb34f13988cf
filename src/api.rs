//! JSON API consumed by the dashboard front end

use crate::cache::{Dataset, DatasetCache};
use crate::error::{LoadError, RecommendationError, SelectionError};
use crate::filter::{Level, LocationSelection};
use crate::ingestion::types::{SourceFile, SourceWarning};
use crate::recommend::Recommendation;
use crate::report::REPORT_FILE_NAME;
use crate::session::{DashboardView, Page, Session};
use crate::stats::{map_points, TrendSeries};
use crate::weather::{WeatherClient, WeatherLookup};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DatasetCache>,
    pub sources: Arc<Vec<SourceFile>>,
    pub download_timeout: Duration,
    pub weather: Arc<WeatherClient>,
    pub sessions: Arc<RwLock<HashMap<Uuid, StoredSession>>>,
    pub session_idle: Duration,
}

/// A session plus when it was last used
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session: Session,
    pub last_seen: Instant,
}

impl StoredSession {
    fn new() -> Self {
        StoredSession {
            session: Session::new(),
            last_seen: Instant::now(),
        }
    }

    fn is_idle(&self, limit: Duration) -> bool {
        self.last_seen.elapsed() >= limit
    }
}

impl AppState {
    pub fn new(
        cache: Arc<DatasetCache>,
        sources: Vec<SourceFile>,
        download_timeout: Duration,
        weather: WeatherClient,
        session_idle: Duration,
    ) -> Self {
        AppState {
            cache,
            sources: Arc::new(sources),
            download_timeout,
            weather: Arc::new(weather),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            session_idle,
        }
    }

    async fn dataset(&self) -> Result<Arc<Dataset>, ApiError> {
        Ok(self
            .cache
            .get_or_fetch(&self.sources, self.download_timeout)
            .await?)
    }

    async fn session(&self, id: Uuid) -> Result<Session, ApiError> {
        self.update_session(id, |session| Ok(session.clone())).await
    }

    /// Run `f` against the stored session and return what it produced
    ///
    /// Every access counts as use. A session idle past the limit is gone.
    async fn update_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut sessions = self.sessions.write().await;
        if sessions.get(&id).is_some_and(|s| s.is_idle(self.session_idle)) {
            debug!("Session {} expired", id);
            sessions.remove(&id);
        }

        let stored = sessions.get_mut(&id).ok_or(ApiError::UnknownSession(id))?;
        stored.last_seen = Instant::now();
        f(&mut stored.session)
    }
}

#[derive(Debug)]
pub enum ApiError {
    UnknownSession(Uuid),
    SelectionChanged,
    Selection(SelectionError),
    Recommendation(RecommendationError),
    Load(LoadError),
    Internal(anyhow::Error),
}

impl From<SelectionError> for ApiError {
    fn from(e: SelectionError) -> Self {
        ApiError::Selection(e)
    }
}

impl From<RecommendationError> for ApiError {
    fn from(e: RecommendationError) -> Self {
        ApiError::Recommendation(e)
    }
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        ApiError::Load(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownSession(id) => (StatusCode::NOT_FOUND, format!("Unknown session {}", id)),
            ApiError::SelectionChanged => (
                StatusCode::CONFLICT,
                "Selection changed while generating, try again".to_string(),
            ),
            ApiError::Selection(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Recommendation(e) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Load(e) => {
                error!("Dataset unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Serialize, Deserialize)]
struct ApiResponse {
    message: String,
    status: String,
}

#[derive(Serialize)]
struct SessionCreated {
    session_id: Uuid,
}

#[derive(Serialize)]
struct DatasetStatus {
    records: usize,
    warnings: Vec<SourceWarning>,
}

#[derive(Deserialize)]
pub struct SelectionRequest {
    pub level: Level,
    #[serde(default)]
    pub value: String,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Deserialize)]
pub struct PageRequest {
    pub page: Page,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/dataset", get(dataset_status))
        .route("/api/reload", post(reload))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", delete(delete_session))
        .route("/api/sessions/:id/options", get(options))
        .route("/api/sessions/:id/selection", put(select))
        .route("/api/sessions/:id/search", put(search))
        .route("/api/sessions/:id/page", put(set_page))
        .route("/api/sessions/:id/clear", post(clear))
        .route("/api/sessions/:id/recommendation", post(generate_recommendation))
        .route("/api/sessions/:id/dashboard", get(dashboard))
        .route("/api/sessions/:id/trends", get(trends))
        .route("/api/sessions/:id/map", get(map))
        .route("/api/sessions/:id/report", get(report))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Groundwater dashboard API is running!".to_string(),
        status: "ok".to_string(),
    })
}

async fn dataset_status(State(state): State<AppState>) -> Result<Json<DatasetStatus>, ApiError> {
    let dataset = state.dataset().await?;
    Ok(Json(DatasetStatus {
        records: dataset.table.len(),
        warnings: dataset.warnings.clone(),
    }))
}

async fn reload(State(state): State<AppState>) -> Result<Json<DatasetStatus>, ApiError> {
    let dataset = state
        .cache
        .refetch(&state.sources, state.download_timeout)
        .await?;
    Ok(Json(DatasetStatus {
        records: dataset.table.len(),
        warnings: dataset.warnings.clone(),
    }))
}

async fn create_session(State(state): State<AppState>) -> Json<SessionCreated> {
    let id = Uuid::new_v4();
    let mut sessions = state.sessions.write().await;

    let before = sessions.len();
    sessions.retain(|_, s| !s.is_idle(state.session_idle));
    if sessions.len() < before {
        info!("Expired {} idle sessions", before - sessions.len());
    }

    sessions.insert(id, StoredSession::new());
    info!("Created session {} ({} active)", id, sessions.len());
    Json(SessionCreated { session_id: id })
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or(ApiError::UnknownSession(id))?;
    info!("Deleted session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn options(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BTreeMap<Level, Vec<String>>>, ApiError> {
    let dataset = state.dataset().await?;
    let session = state.session(id).await?;
    Ok(Json(session.options(&dataset)))
}

async fn select(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectionRequest>,
) -> Result<Json<Session>, ApiError> {
    let dataset = state.dataset().await?;
    state
        .update_session(id, |session| {
            session.select(&dataset, request.level, &request.value)?;
            Ok(Json(session.clone()))
        })
        .await
}

async fn search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Session>, ApiError> {
    state
        .update_session(id, |session| {
            session.set_query(&request.query);
            Ok(Json(session.clone()))
        })
        .await
}

async fn set_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PageRequest>,
) -> Result<Json<Session>, ApiError> {
    state
        .update_session(id, |session| {
            session.set_page(request.page);
            Ok(Json(session.clone()))
        })
        .await
}

async fn clear(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    state
        .update_session(id, |session| {
            session.clear();
            Ok(Json(session.clone()))
        })
        .await
}

/// Weather for the session's current selection, looked up without holding any lock
async fn current_weather(state: &AppState, session: &Session) -> WeatherLookup {
    state.weather.lookup(&session.selection).await
}

/// Generate against weather fetched for `selection`, unless the session has since moved on
fn recommend_for(
    session: &mut Session,
    dataset: &Dataset,
    selection: &LocationSelection,
    weather: &WeatherLookup,
) -> Result<Recommendation, ApiError> {
    if session.selection != *selection {
        return Err(ApiError::SelectionChanged);
    }
    Ok(session.generate_recommendation(dataset, weather)?.clone())
}

async fn generate_recommendation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Recommendation>, ApiError> {
    let dataset = state.dataset().await?;
    let snapshot = state.session(id).await?;
    let weather = current_weather(&state, &snapshot).await;

    state
        .update_session(id, |session| {
            recommend_for(session, &dataset, &snapshot.selection, &weather).map(Json)
        })
        .await
}

async fn dashboard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DashboardView>, ApiError> {
    let dataset = state.dataset().await?;
    let session = state.session(id).await?;
    let weather = current_weather(&state, &session).await;
    Ok(Json(session.dashboard(&dataset, weather)))
}

async fn trends(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TrendSeries>>, ApiError> {
    let dataset = state.dataset().await?;
    let session = state.session(id).await?;
    Ok(Json(session.trends(&dataset)))
}

async fn map(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    let dataset = state.dataset().await?;
    let session = state.session(id).await?;
    Ok(Json(map_points(&session.filtered(&dataset))))
}

async fn report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let dataset = state.dataset().await?;
    let session = state.session(id).await?;
    let weather = current_weather(&state, &session).await;
    let body = session.report(&dataset, &weather)?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", REPORT_FILE_NAME),
        ),
    ];

    Ok((headers, body).into_response())
}
