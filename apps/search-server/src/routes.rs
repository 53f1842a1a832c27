//! HTTP surface of the demo server.
//!
//! Every search endpoint accepts the same payload shape,
//! `{pagination, filter, populates, selects}`, either as a JSON body or as
//! JSON-encoded query parameters.

use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::sea_query::{Alias, Expr, Order, Query as SqlQuery, SelectStatement};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, TransactionTrait};
use searchkit_db::{
    Envelope, FilterSpec, FrameworkException, ModelQuery, Pagination, Projection, QueryKind,
    RawSearchPayload, RelationMap, SearchConfig, SearchHelper, api_view, build_query,
    generate_equal_cond, trans,
};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::filters::FieldEqFilter;
use crate::schema::{self, post, user};

const USER_FILTER: FieldEqFilter = FieldEqFilter::new(&["id", "name", "email", "status"]);
const POST_FILTER: FieldEqFilter = FieldEqFilter::new(&["id", "user_id"]);
const REPORT_FILTER: FieldEqFilter = FieldEqFilter::new(&["user_id", "posts"]);

/// Shared handler state.
#[must_use]
pub struct AppState {
    pub db: DatabaseConnection,
    users: SearchHelper<FieldEqFilter>,
    posts: SearchHelper<FieldEqFilter>,
    reports: SearchHelper<FieldEqFilter>,
    user_relations: RelationMap<user::Entity>,
    post_relations: RelationMap<post::Entity>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: &SearchConfig) -> Self {
        Self {
            db,
            users: SearchHelper::new(config.clone(), USER_FILTER),
            posts: SearchHelper::new(config.clone(), POST_FILTER),
            reports: SearchHelper::new(config.clone(), REPORT_FILTER),
            user_relations: schema::user_relations(),
            post_relations: schema::post_relations(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/health",
            get(|| async { api_view(Envelope::Value(json!({ "status": "ok" }))) }),
        )
        .route("/users", get(list_users))
        .route("/users/search", post(search_users))
        .route("/users/by-ids", post(users_by_ids))
        .route("/posts/search", post(search_posts))
        .route("/reports/posts-per-user/search", post(search_posts_per_user))
        .layer(Extension(state))
}

/// Query-string form of the search payload; every field is JSON text.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pagination: Option<String>,
    filter: Option<String>,
    populates: Option<String>,
    selects: Option<String>,
}

impl From<SearchParams> for RawSearchPayload {
    fn from(params: SearchParams) -> Self {
        Self {
            pagination: params.pagination.map(JsonValue::String),
            filter: params.filter.map(JsonValue::String),
            populates: params.populates.map(JsonValue::String),
            selects: params.selects.map(JsonValue::String),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    ids: Vec<i64>,
}

fn respond(result: searchkit_db::Result<Envelope>) -> Result<Response, FrameworkException> {
    let envelope = result.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "search failed");
        Envelope::from(err)
    });
    api_view(envelope)
}

async fn list_users(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Response, FrameworkException> {
    respond(users(&state, params.into()).await)
}

async fn search_users(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RawSearchPayload>,
) -> Result<Response, FrameworkException> {
    respond(users(&state, payload).await)
}

async fn users(state: &AppState, payload: RawSearchPayload) -> searchkit_db::Result<Envelope> {
    let request = payload.normalize()?;
    let query = ModelQuery::new(user::Entity::find().order_by_asc(user::Column::Id))
        .with_relations(&state.user_relations);
    state
        .users
        .search_payload(&state.db, query, request)
        .await
}

async fn users_by_ids(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<IdsRequest>,
) -> Result<Response, FrameworkException> {
    let mut query = ModelQuery::new(user::Entity::find().order_by_asc(user::Column::Id));
    generate_equal_cond(&mut query, &body.ids, "id");
    let result = state
        .users
        .search(
            &state.db,
            query,
            &Pagination::default(),
            &FilterSpec::default(),
            &Projection::default(),
        )
        .await;
    respond(result)
}

async fn search_posts(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RawSearchPayload>,
) -> Result<Response, FrameworkException> {
    respond(posts(&state, payload).await)
}

async fn posts(state: &AppState, payload: RawSearchPayload) -> searchkit_db::Result<Envelope> {
    let request = payload.normalize()?;
    let query = ModelQuery::new(post::Entity::find().order_by_asc(post::Column::Id))
        .with_relations(&state.post_relations);
    state
        .posts
        .search_payload(&state.db, query, request)
        .await
}

/// `SELECT user_id, COUNT(id) AS posts FROM posts GROUP BY user_id`.
fn posts_per_user() -> SelectStatement {
    let mut stmt = SqlQuery::select();
    stmt.column(Alias::new("user_id"))
        .expr_as(Expr::col(Alias::new("id")).count(), Alias::new("posts"))
        .from(Alias::new("posts"))
        .group_by_col(Alias::new("user_id"));
    stmt
}

async fn search_posts_per_user(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RawSearchPayload>,
) -> Result<Response, FrameworkException> {
    respond(posts_per_user_report(&state, payload).await)
}

/// Aggregate report; the count and the page are read in one transaction.
async fn posts_per_user_report(
    state: &AppState,
    payload: RawSearchPayload,
) -> searchkit_db::Result<Envelope> {
    let request = payload.normalize()?;
    let tx = state.db.begin().await?;

    let mut query =
        build_query(posts_per_user(), Some("per_user")).with_kind(QueryKind::Aggregate);
    query
        .statement_mut()
        .order_by(Alias::new("user_id"), Order::Asc);

    let envelope = state
        .reports
        .search_database_payload(&state.db, trans(query, Some(&tx)), request)
        .await?;
    tx.commit().await?;
    Ok(envelope)
}
