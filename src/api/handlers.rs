use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::dashboard::{self, Dashboard};
use crate::db::TransactionFilter;
use crate::error::{ApiError, ApiResult};
use crate::models::*;
use crate::service::{self, ChangeSet, SyncStatusReport};
use crate::sync::{SyncRequest, SyncResponse};

/// Unwrap a JSON body. A missing caller is reported before a bad body.
fn body<T>(caller: Option<Uuid>, payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    caller.ok_or(ApiError::Unauthenticated)?;
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TransactionQuery {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    kind: Option<String>,
    category_id: Option<Uuid>,
    source: Option<String>,
    limit: Option<u32>,
}

impl TransactionQuery {
    fn into_filter(self) -> ApiResult<TransactionFilter> {
        let kind = self
            .kind
            .map(|k| {
                TransactionType::parse(&k)
                    .ok_or_else(|| ApiError::validation(format!("unknown transaction type: {k}")))
            })
            .transpose()?;
        let sources = self
            .source
            .map(|s| {
                TransactionSource::parse(&s)
                    .ok_or_else(|| ApiError::validation(format!("unknown source: {s}")))
            })
            .transpose()?
            .into_iter()
            .collect();
        Ok(TransactionFilter {
            from: self.from,
            to: self.to,
            kind,
            category_ids: self.category_id.into_iter().collect(),
            sources,
            limit: self.limit,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ChangesQuery {
    #[serde(default)]
    since: i64,
}

// ── Handlers ──────────────────────────────────────────────────

pub(super) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub(super) async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Profile>> {
    let caller = state.caller(&headers);
    let profile = state.blocking(caller, |db, caller| service::me(db, caller)).await?;
    Ok(Json(profile))
}

pub(super) async fn sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> ApiResult<Json<SyncResponse>> {
    let caller = state.caller(&headers);
    let request = body(caller, payload)?;
    let coordinator = state.coordinator;
    let response = state
        .blocking(caller, move |db, caller| coordinator.sync(db, caller, request))
        .await?;
    Ok(Json(response))
}

pub(super) async fn sync_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SyncStatusReport>> {
    let caller = state.caller(&headers);
    let report = state
        .blocking(caller, |db, caller| service::sync_status(db, caller))
        .await?;
    Ok(Json(report))
}

pub(super) async fn changes(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<ChangesQuery>, QueryRejection>,
) -> ApiResult<Json<ChangeSet>> {
    let caller = state.caller(&headers);
    let since = Version(query(params)?.since);
    let changes = state
        .blocking(caller, move |db, caller| service::changes_since(db, caller, since))
        .await?;
    Ok(Json(changes))
}

pub(super) async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Dashboard>> {
    let caller = state.caller(&headers);
    let summary = state
        .blocking(caller, |db, caller| dashboard::build(db, caller))
        .await?;
    Ok(Json(summary))
}

// ── Transactions ──────────────────────────────────────────────

pub(super) async fn list_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<TransactionQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let caller = state.caller(&headers);
    let filter = query(params)?.into_filter()?;
    let found = state
        .blocking(caller, move |db, caller| service::transactions(db, caller, &filter))
        .await?;
    Ok(Json(found))
}

pub(super) async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TransactionInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let caller = state.caller(&headers);
    let input = body(caller, payload)?;
    let created = state
        .blocking(caller, move |db, caller| service::create_transaction(db, caller, &input))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(super) async fn get_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Transaction>> {
    let caller = state.caller(&headers);
    let found = state
        .blocking(caller, move |db, caller| service::transaction(db, caller, id))
        .await?;
    Ok(Json(found))
}

pub(super) async fn update_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Result<Json<TransactionInput>, JsonRejection>,
) -> ApiResult<Json<Transaction>> {
    let caller = state.caller(&headers);
    let input = body(caller, payload)?;
    let updated = state
        .blocking(caller, move |db, caller| service::update_transaction(db, caller, id, &input))
        .await?;
    Ok(Json(updated))
}

pub(super) async fn delete_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let caller = state.caller(&headers);
    state
        .blocking(caller, move |db, caller| service::delete_transaction(db, caller, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Budgets ───────────────────────────────────────────────────

pub(super) async fn list_budgets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<BudgetView>>> {
    let caller = state.caller(&headers);
    let found = state
        .blocking(caller, |db, caller| service::budgets(db, caller))
        .await?;
    Ok(Json(found))
}

pub(super) async fn create_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<BudgetInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Budget>)> {
    let caller = state.caller(&headers);
    let input = body(caller, payload)?;
    let created = state
        .blocking(caller, move |db, caller| service::create_budget(db, caller, &input))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(super) async fn get_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Budget>> {
    let caller = state.caller(&headers);
    let found = state
        .blocking(caller, move |db, caller| service::budget(db, caller, id))
        .await?;
    Ok(Json(found))
}

pub(super) async fn update_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Result<Json<BudgetInput>, JsonRejection>,
) -> ApiResult<Json<Budget>> {
    let caller = state.caller(&headers);
    let input = body(caller, payload)?;
    let updated = state
        .blocking(caller, move |db, caller| service::update_budget(db, caller, id, &input))
        .await?;
    Ok(Json(updated))
}

pub(super) async fn delete_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let caller = state.caller(&headers);
    state
        .blocking(caller, move |db, caller| service::delete_budget(db, caller, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Categories ────────────────────────────────────────────────

pub(super) async fn list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Category>>> {
    let caller = state.caller(&headers);
    let found = state
        .blocking(caller, |db, caller| service::categories(db, caller))
        .await?;
    Ok(Json(found))
}

pub(super) async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let caller = state.caller(&headers);
    let input = body(caller, payload)?;
    let created = state
        .blocking(caller, move |db, caller| service::create_category(db, caller, input))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
