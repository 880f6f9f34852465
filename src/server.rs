use crate::{
    builder::{self, BuiltQuery},
    config::AppConfig,
    db,
    envelope::{Envelope, HealthStatus},
    error::{Result, ServiceError},
    executor::Engine,
    phrase,
    state::AppState,
};
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

const API_KEY_HEADER: &str = "x-api-key";

/// Inbound body: a natural-language phrase or a raw statement. Exactly
/// one must be present; the phrase path wins when both are.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub phrase: Option<String>,
    #[serde(default)]
    pub statement: Option<String>,
}

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

impl Server {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect_pool(&config).await?;
        let config = Arc::new(config);
        let engine = Engine::new(pool);
        let state = AppState::new(Arc::clone(&config), engine);

        Ok(Self { config, state })
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(Self::health))
            .route("/process-request", post(Self::relay))
            .route("/query", post(Self::relay))
            .with_state(self.state.clone())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "dbrelay listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn health() -> Json<HealthStatus> {
        Json(HealthStatus::current())
    }

    async fn relay(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(request): Json<RelayRequest>,
    ) -> Result<Json<Envelope>> {
        let started = Instant::now();
        enforce_api_key(&headers, &state.config)?;

        let query = plan_query(&state.config, &request)?;
        let result = state.engine.execute(&query).await?;

        Ok(Json(Envelope::from_result(
            result,
            started.elapsed().as_secs_f64(),
        )))
    }
}

fn plan_query(config: &AppConfig, request: &RelayRequest) -> Result<BuiltQuery> {
    if let Some(text) = request.phrase.as_deref() {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::Validation("phrase must not be empty".into()));
        }
        let predicates = phrase::extract(text, Utc::now());
        return Ok(builder::build(&predicates));
    }

    if let Some(statement) = request.statement.as_deref() {
        let statement = statement.trim();
        if statement.is_empty() {
            return Err(ServiceError::Validation(
                "statement must not be empty".into(),
            ));
        }
        if !config.allow_raw {
            return Err(ServiceError::Validation(
                "raw statement execution is disabled".into(),
            ));
        }
        return Ok(BuiltQuery::raw(statement));
    }

    Err(ServiceError::Validation(
        "request must include a phrase or a statement".into(),
    ))
}

fn enforce_api_key(headers: &HeaderMap, config: &AppConfig) -> Result<()> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        None => Err(ServiceError::Authentication),
        Some(key) if key != config.api_key => Err(ServiceError::Authorization),
        Some(_) => Ok(()),
    }
}
