//! Demo tables: users and their posts.

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    Schema, Set,
};
use searchkit_db::RelationMap;

pub mod user {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub email: String,
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

/// Relations clients may request through `populates`.
pub fn user_relations() -> RelationMap<user::Entity> {
    RelationMap::new().insert("posts", user::Relation::Posts)
}

pub fn post_relations() -> RelationMap<post::Entity> {
    RelationMap::new().insert("user", post::Relation::User)
}

/// Create the demo tables if they do not exist yet.
///
/// # Errors
/// Returns the database error of the first failing statement.
pub async fn ensure_schema(conn: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut users = schema.create_table_from_entity(user::Entity);
    conn.execute(backend.build(users.if_not_exists())).await?;

    let mut posts = schema.create_table_from_entity(post::Entity);
    conn.execute(backend.build(posts.if_not_exists())).await?;
    Ok(())
}

/// Fill the demo tables unless they already hold users.
///
/// Inserts `users` users; user `n` gets `n % 4` posts. Odd ids are `active`.
///
/// # Errors
/// Returns the database error of the first failing insert.
pub async fn seed_demo<C: ConnectionTrait>(conn: &C, users: i64) -> Result<(), DbErr> {
    if user::Entity::find().count(conn).await? > 0 {
        return Ok(());
    }

    let mut post_id = 0;
    for id in 1..=users {
        let status = if id % 2 == 1 { "active" } else { "inactive" };
        user::ActiveModel {
            id: Set(id),
            name: Set(format!("user-{id:02}")),
            email: Set(format!("user{id}@example.com")),
            status: Set(status.to_owned()),
        }
        .insert(conn)
        .await?;

        for n in 0..id % 4 {
            post_id += 1;
            post::ActiveModel {
                id: Set(post_id),
                user_id: Set(id),
                title: Set(format!("post {n} by user {id}")),
            }
            .insert(conn)
            .await?;
        }
    }
    tracing::info!(users, posts = post_id, "seeded demo data");
    Ok(())
}
