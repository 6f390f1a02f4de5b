mod common;

use messenger_service::services::message_service::MessageService;
use uuid::Uuid;

#[tokio::test]
async fn replayed_send_returns_the_original_row() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: no test database configured");
        return;
    };
    let (conversation_id, sender, _) = common::direct_conversation(&pool).await;
    let key = Uuid::new_v4().to_string();

    let first = MessageService::append(&pool, conversation_id, sender, "hello", Some(&key))
        .await
        .unwrap();
    assert!(first.created);

    let replay = MessageService::append(&pool, conversation_id, sender, "hello", Some(&key))
        .await
        .unwrap();
    assert!(!replay.created);
    assert_eq!(replay.message.id, first.message.id);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND idempotency_key = $2",
    )
    .bind(conversation_id)
    .bind(&key)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn concurrent_sends_with_one_key_converge_on_one_row() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: no test database configured");
        return;
    };
    let (conversation_id, sender, _) = common::direct_conversation(&pool).await;
    let key = Uuid::new_v4().to_string();

    let (a, b) = tokio::join!(
        MessageService::append(&pool, conversation_id, sender, "race", Some(&key)),
        MessageService::append(&pool, conversation_id, sender, "race", Some(&key)),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(a.message.id, b.message.id);
    // Exactly one of the two calls created the row.
    assert_eq!(usize::from(a.created) + usize::from(b.created), 1);
}

#[tokio::test]
async fn blank_key_is_treated_as_absent() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: no test database configured");
        return;
    };
    let (conversation_id, sender, _) = common::direct_conversation(&pool).await;

    let first = MessageService::append(&pool, conversation_id, sender, "one", Some("   "))
        .await
        .unwrap();
    let second = MessageService::append(&pool, conversation_id, sender, "two", Some("   "))
        .await
        .unwrap();

    assert!(first.created);
    assert!(second.created);
    assert_ne!(first.message.id, second.message.id);
    assert_eq!(first.message.idempotency_key, None);
}

#[tokio::test]
async fn same_key_in_different_conversations_is_independent() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: no test database configured");
        return;
    };
    let (conv_a, sender_a, _) = common::direct_conversation(&pool).await;
    let (conv_b, sender_b, _) = common::direct_conversation(&pool).await;
    let key = Uuid::new_v4().to_string();

    let a = MessageService::append(&pool, conv_a, sender_a, "in a", Some(&key))
        .await
        .unwrap();
    let b = MessageService::append(&pool, conv_b, sender_b, "in b", Some(&key))
        .await
        .unwrap();

    assert!(a.created);
    assert!(b.created);
    assert_ne!(a.message.id, b.message.id);
}
