// /server/src/db.rs
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn connect_db(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
