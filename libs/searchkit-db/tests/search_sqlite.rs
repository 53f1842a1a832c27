#![allow(clippy::unwrap_used, clippy::expect_used)]
#![cfg(feature = "sqlite")]

mod support;

use sea_orm::sea_query::Expr;
use sea_orm::{EntityTrait, QueryOrder, QuerySelect, TransactionTrait};
use searchkit_db::{
    Envelope, FilterApplier, FilterSpec, ModelQuery, NoFilter, Pagination, Projection,
    QueryKind, RawSearchPayload, RelationMap, SearchConfig, SearchError, SearchHelper,
    SearchQuery, SearchResult, TableQuery, build_query, generate_equal_cond, trans,
};
use serde_json::json;
use support::{USERS, USERS_WITH_POSTS, ids, post, posts_of, posts_per_user, setup_db, user};

fn result(envelope: Envelope) -> SearchResult {
    match envelope {
        Envelope::PassThrough(result) => result,
        other => panic!("expected pass-through envelope, got {other:?}"),
    }
}

fn payload(value: serde_json::Value) -> searchkit_db::SearchRequest {
    serde_json::from_value::<RawSearchPayload>(value)
        .unwrap()
        .normalize()
        .unwrap()
}

fn users_by_id() -> ModelQuery<'static, user::Entity> {
    ModelQuery::new(user::Entity::find().order_by_asc(user::Column::Id))
}

/// Entity-side twin of `posts_per_user`: one row per author with a `posts` count.
fn posts_per_author() -> ModelQuery<'static, post::Entity> {
    ModelQuery::new(
        post::Entity::find()
            .select_only()
            .column(post::Column::UserId)
            .column_as(Expr::col((post::Entity, post::Column::Id)).count(), "posts")
            .group_by(post::Column::UserId)
            .order_by_asc(post::Column::UserId),
    )
}

fn assert_counts_match_seed(rows: &[serde_json::Value]) {
    for row in rows {
        let user_id = row["user_id"].as_i64().unwrap();
        assert_eq!(row["posts"].as_i64(), Some(posts_of(user_id)), "{row}");
    }
}

/// Equality filter over a fixed set of columns, like an application would ship.
struct StatusFilter;

impl FilterApplier for StatusFilter {
    fn apply<Q: SearchQuery>(
        &self,
        query: &mut Q,
        _pagination: &Pagination,
        filter: &FilterSpec,
    ) -> searchkit_db::Result<()> {
        let Some(obj) = filter.as_value().and_then(|v| v.as_object()) else {
            return Ok(());
        };
        for (key, value) in obj {
            if key != "status" {
                return Err(SearchError::InvalidFilter(key.clone()));
            }
            let Some(status) = value.as_str() else {
                return Err(SearchError::InvalidFilter(key.clone()));
            };
            let status = status.to_owned();
            query.where_group(|g| {
                g.and_where("status", status);
            });
        }
        Ok(())
    }
}

#[tokio::test]
async fn native_branch_returns_requested_page() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let request = payload(json!({
        "pagination": {"page": 1, "rowsPerPage": 10},
        "filter": {},
        "selects": ["id", "name"]
    }));
    let res = result(
        helper
            .search_payload(&conn, users_by_id(), request)
            .await
            .unwrap(),
    );

    let meta = res.meta().unwrap();
    assert_eq!(res.data().len(), 10);
    assert_eq!(meta.total, 25);
    assert_eq!(meta.last_page, 3);
    assert_eq!(meta.page, 1);

    let first = res.data()[0].as_object().unwrap();
    let mut keys: Vec<_> = first.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, ["id", "name"]);
}

#[tokio::test]
async fn native_branch_skips_previous_pages() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let res = result(
        helper
            .search(
                &conn,
                users_by_id(),
                &Pagination::new(3, 10),
                &FilterSpec::default(),
                &Projection::default(),
            )
            .await
            .unwrap(),
    );

    assert_eq!(ids(res.data(), "id"), (21..=25).collect::<Vec<_>>());
    assert_eq!(res.meta().unwrap().last_page, 3);
}

#[tokio::test]
async fn native_branch_without_rows_per_page_is_unbounded() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let request = payload(json!({"pagination": "{\"page\": 1}"}));
    let res = result(
        helper
            .search_payload(&conn, users_by_id(), request)
            .await
            .unwrap(),
    );

    let meta = res.meta().unwrap();
    assert_eq!(res.data().len(), 25);
    assert_eq!(meta.per_page, SearchConfig::default().unbounded_per_page);
    assert_eq!(meta.last_page, 1);
}

#[tokio::test]
async fn page_past_the_end_is_empty_not_an_error() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let res = result(
        helper
            .search(
                &conn,
                users_by_id(),
                &Pagination::new(9, 10),
                &FilterSpec::default(),
                &Projection::default(),
            )
            .await
            .unwrap(),
    );

    assert!(res.data().is_empty());
    assert_eq!(res.meta().unwrap().total, 25);
}

#[tokio::test]
async fn aggregate_branch_clamps_page_and_counts_groups() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let request = payload(json!({"pagination": {"page": 0, "rowsPerPage": 5}}));
    let res = result(
        helper
            .search_database_payload(&conn, TableQuery::new(posts_per_user()), request)
            .await
            .unwrap(),
    );

    let meta = res.meta().unwrap();
    assert_eq!(res.data().len(), 5);
    assert_eq!(meta.page, 1);
    assert_eq!(meta.per_page, 5);
    assert_eq!(meta.total, 12);
    assert_eq!(meta.last_page, 3);
    assert_eq!(ids(res.data(), "user_id"), [1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn aggregate_branch_slices_later_pages() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let res = result(
        helper
            .search_database(
                &conn,
                TableQuery::new(posts_per_user()),
                &Pagination::new(3, 5),
                &FilterSpec::default(),
                None,
            )
            .await
            .unwrap(),
    );

    assert_eq!(ids(res.data(), "user_id"), [11, 12]);
    for row in res.data() {
        let user_id = row["user_id"].as_i64().unwrap();
        assert_eq!(row["posts"].as_i64().unwrap(), posts_of(user_id));
    }
}

#[tokio::test]
async fn aggregate_without_limit_returns_every_group() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let res = result(
        helper
            .search_database(
                &conn,
                TableQuery::new(posts_per_user()),
                &Pagination::new(2, 0),
                &FilterSpec::default(),
                None,
            )
            .await
            .unwrap(),
    );

    let meta = res.meta().unwrap();
    assert_eq!(res.data().len(), 12);
    assert_eq!(meta.total, 12);
    assert_eq!(meta.per_page, 0);
    assert_eq!(meta.last_page, 1);
    assert_eq!(meta.page, 2);
}

#[tokio::test]
async fn explicit_kind_wins_over_detection() {
    let conn = setup_db().await.unwrap();
    let config = SearchConfig {
        aggregate_marker: String::new(),
        ..SearchConfig::default()
    };
    let helper = SearchHelper::new(config, NoFilter);

    let query = TableQuery::new(posts_per_user()).with_kind(QueryKind::Aggregate);
    let res = result(
        helper
            .search_database(
                &conn,
                query,
                &Pagination::new(1, 5),
                &FilterSpec::default(),
                None,
            )
            .await
            .unwrap(),
    );

    assert_eq!(res.meta().unwrap().total, 12);
    assert_eq!(res.meta().unwrap().per_page, 5);
}

#[tokio::test]
async fn missing_page_returns_plain_rows() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let request = payload(json!({"pagination": {"rowsPerPage": 5}}));
    let res = result(
        helper
            .search_database_payload(&conn, TableQuery::new(posts_per_user()), request)
            .await
            .unwrap(),
    );

    assert!(matches!(res, SearchResult::Plain(_)));
    assert_eq!(res.data().len(), 12);
}

#[tokio::test]
async fn filter_runs_before_pagination() {
    let conn = setup_db().await.unwrap();
    let helper = SearchHelper::new(SearchConfig::default(), StatusFilter);

    let request = payload(json!({
        "pagination": {"page": 2, "rowsPerPage": 10},
        "filter": "{\"status\": \"active\"}"
    }));
    let res = result(
        helper
            .search_payload(&conn, users_by_id(), request)
            .await
            .unwrap(),
    );

    assert_eq!(res.meta().unwrap().total, 13);
    assert_eq!(ids(res.data(), "id"), [21, 23, 25]);
}

#[tokio::test]
async fn filter_errors_propagate() {
    let conn = setup_db().await.unwrap();
    let helper = SearchHelper::new(SearchConfig::default(), StatusFilter);

    let err = helper
        .search(
            &conn,
            users_by_id(),
            &Pagination::default(),
            &FilterSpec::from(json!({"password": "x"})),
            &Projection::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidFilter(field) if field == "password"));
}

#[tokio::test]
async fn table_query_native_pagination() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let selects = vec!["id".to_owned()];
    let res = result(
        helper
            .search_database(
                &conn,
                TableQuery::from_table("users"),
                &Pagination::new(2, 10),
                &FilterSpec::default(),
                Some(&selects),
            )
            .await
            .unwrap(),
    );

    assert_eq!(res.data().len(), 10);
    assert_eq!(res.meta().unwrap().total, 25);
}

#[tokio::test]
async fn built_subquery_filters_computed_columns() {
    let conn = setup_db().await.unwrap();

    let mut query = build_query(posts_per_user(), Some("per_user"));
    query.where_group(|g| {
        g.and_where("posts", 3);
    });
    let rows = query.fetch_all(&conn).await.unwrap();

    let expected: Vec<i64> = (1..=USERS_WITH_POSTS).filter(|id| posts_of(*id) == 3).collect();
    let mut got = ids(&rows, "user_id");
    got.sort_unstable();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn equal_cond_matches_exactly_the_given_ids() {
    let conn = setup_db().await.unwrap();

    let mut query = users_by_id();
    generate_equal_cond(&mut query, &[3_i64, 1, 2], "id");
    let rows = query.fetch_all(&conn).await.unwrap();
    assert_eq!(ids(&rows, "id"), [1, 2, 3]);

    let mut nothing = users_by_id();
    generate_equal_cond::<_, i64>(&mut nothing, &[], "id");
    assert!(nothing.fetch_all(&conn).await.unwrap().is_empty());
}

#[tokio::test]
async fn transaction_sees_its_own_writes() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let tx = conn.begin().await.unwrap();
    support::insert_user(&tx, USERS + 1).await.unwrap();

    let res = result(
        helper
            .search(
                &conn,
                trans(users_by_id(), Some(&tx)),
                &Pagination::new(3, 10),
                &FilterSpec::default(),
                &Projection::default(),
            )
            .await
            .unwrap(),
    );
    assert_eq!(res.meta().unwrap().total, 26);
    assert_eq!(ids(res.data(), "id"), (21..=26).collect::<Vec<_>>());

    let grouped = trans(build_query(users_by_id().statement(), None), Some(&tx))
        .with_kind(QueryKind::Aggregate);
    let res = result(
        helper
            .search_database(
                &conn,
                grouped,
                &Pagination::new(1, 0),
                &FilterSpec::default(),
                None,
            )
            .await
            .unwrap(),
    );
    assert_eq!(res.meta().unwrap().total, 26);

    tx.rollback().await.unwrap();

    let after = users_by_id().fetch_all(&conn).await.unwrap();
    assert_eq!(after.len(), 25);
}

#[tokio::test]
async fn has_many_preload_attaches_arrays() {
    let conn = setup_db().await.unwrap();
    let relations = RelationMap::new().insert("posts", user::Relation::Posts);
    let helper: SearchHelper = SearchHelper::default();

    let mut query = users_by_id().with_relations(&relations);
    generate_equal_cond(&mut query, &[1_i64, 2, 20], "id");

    let request = payload(json!({"populates": [" posts "], "selects": ["id", "name"]}));
    let res = result(helper.search_payload(&conn, query, request).await.unwrap());

    assert_eq!(ids(res.data(), "id"), [1, 2, 20]);
    for row in res.data() {
        let id = row["id"].as_i64().unwrap();
        let posts = row["posts"].as_array().unwrap();
        assert_eq!(i64::try_from(posts.len()).unwrap(), posts_of(id));
        assert!(posts.iter().all(|p| p["user_id"] == json!(id)));
    }
}

#[tokio::test]
async fn preload_on_paginated_rows() {
    let conn = setup_db().await.unwrap();
    let relations = RelationMap::new().insert("user", post::Relation::User);
    let helper: SearchHelper = SearchHelper::default();

    let query = ModelQuery::new(post::Entity::find().order_by_asc(post::Column::Id))
        .with_relations(&relations);
    let projection = Projection::default().with_populates(["user"]);
    let res = result(
        helper
            .search(
                &conn,
                query,
                &Pagination::new(1, 4),
                &FilterSpec::default(),
                &projection,
            )
            .await
            .unwrap(),
    );

    assert_eq!(res.data().len(), 4);
    for row in res.data() {
        assert_eq!(row["user"]["id"], row["user_id"]);
        assert!(row["user"]["name"].is_string());
    }
}

#[tokio::test]
async fn unknown_relation_is_rejected() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let projection = Projection::default().with_populates(["comments"]);
    let err = helper
        .search(
            &conn,
            users_by_id(),
            &Pagination::default(),
            &FilterSpec::default(),
            &projection,
        )
        .await
        .unwrap_err();
    assert!(matches!(&err, SearchError::UnknownRelation(name) if name == "comments"));
    assert_eq!(err.http_code(), Some(400));
}

#[tokio::test]
async fn aggregate_count_is_read_for_any_page() {
    let conn = setup_db().await.unwrap();
    let config = SearchConfig::default();

    for page in [1, 3, 1000] {
        let mut query = TableQuery::new(posts_per_user());
        let res = searchkit_db::pager::paginate(
            &mut query,
            &conn,
            &Pagination::new(page, 10),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(res.meta.total, 12, "page {page}");
        assert_eq!(res.meta.last_page, 2, "page {page}");
        let expected_rows = if page == 1 { 10 } else { 0 };
        assert_eq!(res.data.len(), expected_rows, "page {page}");
    }
}

#[tokio::test]
async fn table_rows_keep_computed_columns() {
    let conn = setup_db().await.unwrap();
    let query = TableQuery::new(posts_per_user());

    let rows = query.fetch_all(&conn).await.unwrap();
    assert_eq!(rows.len(), 12);
    assert_counts_match_seed(&rows);

    let page = query.paginate(&conn, 2, 5).await.unwrap();
    assert_eq!(ids(&page.data, "user_id"), [6, 7, 8, 9, 10]);
    assert_counts_match_seed(&page.data);
}

#[tokio::test]
async fn model_aggregate_counts_groups_and_slices() {
    let conn = setup_db().await.unwrap();
    let detecting: SearchHelper = SearchHelper::default();
    let tag_only = SearchHelper::new(
        SearchConfig {
            aggregate_marker: String::new(),
            ..SearchConfig::default()
        },
        NoFilter,
    );

    let untagged = result(
        detecting
            .search(
                &conn,
                posts_per_author(),
                &Pagination::new(2, 5),
                &FilterSpec::default(),
                &Projection::default(),
            )
            .await
            .unwrap(),
    );
    let tagged = result(
        tag_only
            .search(
                &conn,
                posts_per_author().with_kind(QueryKind::Aggregate),
                &Pagination::new(2, 5),
                &FilterSpec::default(),
                &Projection::default(),
            )
            .await
            .unwrap(),
    );

    for res in [&untagged, &tagged] {
        let meta = res.meta().unwrap();
        assert_eq!(meta.page, 2);
        assert_eq!(meta.per_page, 5);
        assert_eq!(meta.total, 12);
        assert_eq!(meta.last_page, 3);
        assert_eq!(ids(res.data(), "user_id"), [6, 7, 8, 9, 10]);
        assert_counts_match_seed(res.data());
    }
}

#[tokio::test]
async fn model_aggregate_without_limit_returns_every_group() {
    let conn = setup_db().await.unwrap();
    let helper: SearchHelper = SearchHelper::default();

    let request = payload(json!({"pagination": {"page": 0, "rowsPerPage": 0}}));
    let res = result(
        helper
            .search_payload(&conn, posts_per_author(), request)
            .await
            .unwrap(),
    );

    let meta = res.meta().unwrap();
    assert_eq!(meta.page, 1);
    assert_eq!(meta.total, 12);
    assert_eq!(meta.last_page, 1);
    assert_eq!(
        ids(res.data(), "user_id"),
        (1..=USERS_WITH_POSTS).collect::<Vec<_>>()
    );
    assert_counts_match_seed(res.data());
}

#[tokio::test]
async fn preload_requires_the_local_key() {
    let conn = setup_db().await.unwrap();
    let relations = RelationMap::new().insert("posts", user::Relation::Posts);
    let helper: SearchHelper = SearchHelper::default();

    let request = payload(json!({
        "pagination": {"page": 1, "rowsPerPage": 3},
        "populates": ["posts"],
        "selects": ["name"]
    }));
    let err = helper
        .search_payload(&conn, users_by_id().with_relations(&relations), request)
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        SearchError::MissingPreloadKey { relation, column }
            if relation == "posts" && column == "id"
    ));
    assert_eq!(err.http_code(), Some(400));
}
