use sqlx::{Pool, Postgres};

// Embed SQL migrations at compile time for deterministic startup.
const MIG_0001: &str = include_str!("../migrations/0001_create_users.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_conversations.sql");
const MIG_0003: &str = include_str!("../migrations/0003_create_conversation_participants.sql");
const MIG_0004: &str = include_str!("../migrations/0004_create_messages.sql");
const MIG_0005: &str = include_str!("../migrations/0005_create_events.sql");

/// Runs every migration in order. Statements are IF NOT EXISTS so a re-run
/// against an up-to-date database is a no-op.
pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for (i, sql) in [MIG_0001, MIG_0002, MIG_0003, MIG_0004, MIG_0005]
        .into_iter()
        .enumerate()
    {
        sqlx::raw_sql(sql).execute(db).await?;
        tracing::info!(migration = i + 1, "migration applied");
    }
    Ok(())
}
