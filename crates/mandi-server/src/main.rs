use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use mandi_core::{
    DigitalParchi, HealthReport, LedgerError, LedgerResult, Page, ParchiFilter, ParchiStore,
    ParchiUpdate, TradeData, sample_trade,
};
use mandi_finance::AnalyticsReport;
use mandi_platform::{
    CountResponse, CreateParchiRequest, ListParchisQuery, MAX_PAGE_LIMIT, ReportQuery,
    SeedSamplesQuery, SeedSamplesResponse, ServiceConfig, connect_store,
};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn ParchiStore>,
    config: Arc<ServiceConfig>,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "mandi_server=info,mandi_ledger=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8300")?;
    let store = connect_store(&config.store).await?;

    let state = AppState {
        store: store.clone(),
        config: Arc::new(config.clone()),
    };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(health))
        .route("/parchis", post(create_parchi).get(list_parchis))
        .route("/parchis/count", get(count_parchis))
        .route(
            "/parchis/{id}",
            get(get_parchi).patch(update_parchi).delete(delete_parchi),
        )
        .route("/ledger/samples", post(seed_samples))
        .route("/ledger/report", get(ledger_report))
        .with_state(state);

    let addr: SocketAddr = config
        .http_addr
        .parse()
        .with_context(|| format!("HTTP_ADDR is not a socket address: '{}'", config.http_addr))?;
    info!("mandi setu ledger listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await?;
    info!("parchi store closed");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn health(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<HealthReport>), (StatusCode, String)> {
    let report = state.store.health_check().await.map_err(ledger_error)?;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        warn!(error = ?report.error, "parchi store unhealthy");
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((status, Json(report)))
}

async fn create_parchi(
    State(state): State<AppState>,
    Json(payload): Json<CreateParchiRequest>,
) -> Result<(StatusCode, Json<DigitalParchi>), (StatusCode, String)> {
    let parchi = payload
        .into_parchi(&state.config.default_language)
        .map_err(invalid_request)?;
    state.store.save_parchi(&parchi).await.map_err(ledger_error)?;

    info!(
        parchi_id = %parchi.id,
        product = %parchi.trade_data.product_name,
        total_amount = %parchi.trade_data.total_amount,
        "parchi created"
    );
    Ok((StatusCode::CREATED, Json(parchi)))
}

async fn list_parchis(
    State(state): State<AppState>,
    Query(query): Query<ListParchisQuery>,
) -> Result<Json<Vec<DigitalParchi>>, (StatusCode, String)> {
    state
        .store
        .list_parchis(query.page(), &query.filter())
        .await
        .map(Json)
        .map_err(ledger_error)
}

async fn count_parchis(
    State(state): State<AppState>,
    Query(query): Query<ListParchisQuery>,
) -> Result<Json<CountResponse>, (StatusCode, String)> {
    let count = state
        .store
        .count_parchis(&query.filter())
        .await
        .map_err(ledger_error)?;
    Ok(Json(CountResponse { count }))
}

async fn get_parchi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DigitalParchi>, (StatusCode, String)> {
    state
        .store
        .get_parchi(id)
        .await
        .map_err(ledger_error)?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn update_parchi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ParchiUpdate>,
) -> Result<Json<DigitalParchi>, (StatusCode, String)> {
    if !state
        .store
        .update_parchi(id, update)
        .await
        .map_err(ledger_error)?
    {
        return Err(not_found(id));
    }

    state
        .store
        .get_parchi(id)
        .await
        .map_err(ledger_error)?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn delete_parchi(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.store.delete_parchi(id).await.map_err(ledger_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

async fn seed_samples(
    State(state): State<AppState>,
    Query(query): Query<SeedSamplesQuery>,
) -> Result<(StatusCode, Json<SeedSamplesResponse>), (StatusCode, String)> {
    let count = query.count().map_err(invalid_request)?;
    let language = query
        .language
        .unwrap_or_else(|| state.config.default_language.clone());

    let mut rng = StdRng::from_entropy();
    let trades = (0..count)
        .map(|_| sample_trade(&mut rng, &language))
        .collect::<Result<Vec<TradeData>, _>>()
        .map_err(invalid_request)?;

    let mut parchi_ids = Vec::with_capacity(trades.len());
    for trade in trades {
        let parchi = DigitalParchi::new(trade);
        parchi_ids.push(state.store.save_parchi(&parchi).await.map_err(ledger_error)?);
    }

    info!(count = parchi_ids.len(), %language, "sample parchis seeded");
    Ok((
        StatusCode::CREATED,
        Json(SeedSamplesResponse {
            created: parchi_ids.len(),
            parchi_ids,
        }),
    ))
}

async fn ledger_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<AnalyticsReport>, (StatusCode, String)> {
    let parchis = all_parchis(state.store.as_ref())
        .await
        .map_err(ledger_error)?;
    let language = query
        .language
        .unwrap_or_else(|| state.config.default_language.clone());

    AnalyticsReport::build(&parchis, state.config.base_cost, &language)
        .map(Json)
        .map_err(|err| {
            error!(error = %err, "failed to build ledger report");
            internal_error(err)
        })
}

async fn all_parchis(store: &dyn ParchiStore) -> LedgerResult<Vec<DigitalParchi>> {
    let filter = ParchiFilter::default();
    let mut parchis = Vec::new();

    loop {
        let page = Page::new(MAX_PAGE_LIMIT, parchis.len() as u32);
        let batch = store.list_parchis(page, &filter).await?;
        let exhausted = batch.len() < MAX_PAGE_LIMIT as usize;
        parchis.extend(batch);
        if exhausted {
            return Ok(parchis);
        }
    }
}

fn ledger_error(err: LedgerError) -> (StatusCode, String) {
    match err {
        LedgerError::Validation(err) => invalid_request(err),
        LedgerError::Database(err) => {
            error!(error = ?err, "parchi store failure");
            internal_error(err)
        }
    }
}

fn not_found(id: Uuid) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("parchi {id} not found"))
}

fn invalid_request(err: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
