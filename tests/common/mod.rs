use messenger_service::migrations;
use messenger_service::services::conversation_service::ConversationService;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

/// Pool against TEST_DATABASE_URL (falling back to DATABASE_URL), with the
/// schema applied. Returns None when neither variable is set so the suite
/// skips on machines without a reachable Postgres.
pub async fn test_pool() -> Option<Pool<Postgres>> {
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to test database");
    migrations::run_all(&pool).await.expect("apply migrations");
    Some(pool)
}

pub async fn create_user(db: &Pool<Postgres>) -> Uuid {
    let id = Uuid::new_v4();
    let username = format!("user-{}", id.simple());
    sqlx::query("INSERT INTO users (id, username) VALUES ($1, $2)")
        .bind(id)
        .bind(&username)
        .execute(db)
        .await
        .expect("insert test user");
    id
}

pub async fn direct_conversation(db: &Pool<Postgres>) -> (Uuid, Uuid, Uuid) {
    let a = create_user(db).await;
    let b = create_user(db).await;
    let conversation = ConversationService::create_direct(db, a, b)
        .await
        .expect("create direct conversation");
    (conversation.id, a, b)
}
