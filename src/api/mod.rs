//! JSON-over-HTTP surface.
//!
//! Handlers resolve the bearer token to a caller, then run the blocking
//! SQLite work on the blocking pool with a connection of their own. The
//! database file is the only thing request tasks share.

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use crate::auth::TokenIssuer;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::sync::Coordinator;

#[derive(Clone)]
pub(crate) struct AppState {
    db_path: Arc<PathBuf>,
    tokens: Arc<TokenIssuer>,
    coordinator: Coordinator,
}

impl AppState {
    pub(crate) fn new(db_path: PathBuf, tokens: TokenIssuer, coordinator: Coordinator) -> Self {
        Self {
            db_path: Arc::new(db_path),
            tokens: Arc::new(tokens),
            coordinator,
        }
    }

    fn caller(&self, headers: &HeaderMap) -> Option<Uuid> {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        self.tokens.authenticate(header)
    }

    /// Run `f` against a fresh connection on the blocking pool. Requests
    /// without a caller are refused before any connection is opened.
    async fn blocking<T, F>(&self, caller: Option<Uuid>, f: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database, Option<Uuid>) -> ApiResult<T> + Send + 'static,
    {
        let caller = caller.ok_or(ApiError::Unauthenticated)?;
        let path = Arc::clone(&self.db_path);
        tokio::task::spawn_blocking(move || {
            let mut db = Database::connect(&path)?;
            f(&mut db, Some(caller))
        })
        .await?
    }
}

pub(crate) fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/me", get(handlers::me))
        .route("/sync", post(handlers::sync))
        .route("/sync/status", get(handlers::sync_status))
        .route("/sync/changes", get(handlers::changes))
        .route("/dashboard", get(handlers::dashboard))
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction)
                .put(handlers::update_transaction)
                .delete(handlers::delete_transaction),
        )
        .route(
            "/budgets",
            get(handlers::list_budgets).post(handlers::create_budget),
        )
        .route(
            "/budgets/:id",
            get(handlers::get_budget)
                .put(handlers::update_budget)
                .delete(handlers::delete_budget),
        )
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .with_state(state);

    Router::new().nest("/api", api_routes)
}

#[cfg(test)]
mod tests;
