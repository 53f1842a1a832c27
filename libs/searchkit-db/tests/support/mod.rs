//! Shared fixtures: an in-memory `SQLite` database with `users` and `posts`.
//!
//! Seed layout:
//! - 25 users, ids 1..=25; odd ids are `active`, even ids `inactive`
//! - users 1..=12 have `(id % 3) + 1` posts each, the rest have none
#![allow(dead_code)]

use sea_orm::sea_query::{Alias, Expr, Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Set,
};

pub mod user {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub status: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::post::Entity")]
        Posts,
    }

    impl Related<super::post::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Posts.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod post {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "posts")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: i64,
        pub title: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::user::Entity",
            from = "Column::UserId",
            to = "super::user::Column::Id"
        )]
        User,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub const USERS: i64 = 25;
pub const USERS_WITH_POSTS: i64 = 12;

pub async fn setup_db() -> Result<DatabaseConnection, DbErr> {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(opts).await?;
    create_schema(&conn).await?;
    seed(&conn).await?;
    Ok(conn)
}

async fn create_schema(conn: &DatabaseConnection) -> Result<(), DbErr> {
    conn.execute_unprepared(
        "CREATE TABLE users (
id INTEGER PRIMARY KEY NOT NULL,
name TEXT NOT NULL,
status TEXT NOT NULL
)",
    )
    .await?;
    conn.execute_unprepared(
        "CREATE TABLE posts (
id INTEGER PRIMARY KEY NOT NULL,
user_id INTEGER NOT NULL REFERENCES users(id),
title TEXT NOT NULL
)",
    )
    .await?;
    Ok(())
}

async fn seed(conn: &DatabaseConnection) -> Result<(), DbErr> {
    for id in 1..=USERS {
        insert_user(conn, id).await?;
    }

    let mut post_id = 0;
    for user_id in 1..=USERS_WITH_POSTS {
        for n in 0..posts_of(user_id) {
            post_id += 1;
            post::ActiveModel {
                id: Set(post_id),
                user_id: Set(user_id),
                title: Set(format!("post {n} of user {user_id}")),
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

pub async fn insert_user<C: ConnectionTrait>(conn: &C, id: i64) -> Result<(), DbErr> {
    let status = if id % 2 == 1 { "active" } else { "inactive" };
    user::ActiveModel {
        id: Set(id),
        name: Set(format!("user-{id:02}")),
        status: Set(status.to_owned()),
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Number of posts seeded for `user_id` (zero past [`USERS_WITH_POSTS`]).
pub fn posts_of(user_id: i64) -> i64 {
    if user_id > USERS_WITH_POSTS {
        0
    } else {
        (user_id % 3) + 1
    }
}

/// `SELECT user_id, COUNT(id) AS posts FROM posts GROUP BY user_id ORDER BY user_id`.
pub fn posts_per_user() -> SelectStatement {
    let mut stmt = Query::select();
    stmt.column(Alias::new("user_id"))
        .expr_as(Expr::col(Alias::new("id")).count(), Alias::new("posts"))
        .from(Alias::new("posts"))
        .group_by_col(Alias::new("user_id"))
        .order_by(Alias::new("user_id"), sea_orm::sea_query::Order::Asc);
    stmt
}

/// Integer ids of `rows`, in row order.
pub fn ids(rows: &[serde_json::Value], key: &str) -> Vec<i64> {
    rows.iter().filter_map(|r| r[key].as_i64()).collect()
}
