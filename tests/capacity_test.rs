mod common;

use messenger_service::error::AppError;
use messenger_service::models::conversation::MAX_GROUP_PARTICIPANTS;
use messenger_service::models::ParticipantRole;
use messenger_service::services::conversation_service::ConversationService;

#[tokio::test]
async fn group_membership_stops_at_the_cap() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: no test database configured");
        return;
    };
    let owner = common::create_user(&pool).await;
    let conversation = ConversationService::create_group(&pool, "big room", owner)
        .await
        .unwrap();

    // Owner occupies one slot; fill the rest.
    for _ in 1..MAX_GROUP_PARTICIPANTS {
        let member = common::create_user(&pool).await;
        ConversationService::add_participant(
            &pool,
            conversation.id,
            member,
            ParticipantRole::Member,
        )
        .await
        .unwrap();
    }
    let count = ConversationService::count_participants(&pool, conversation.id)
        .await
        .unwrap();
    assert_eq!(count, MAX_GROUP_PARTICIPANTS);

    let overflow = common::create_user(&pool).await;
    let err = ConversationService::add_participant(
        &pool,
        conversation.id,
        overflow,
        ParticipantRole::Member,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)));
}

#[tokio::test]
async fn re_adding_a_participant_is_a_noop() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: no test database configured");
        return;
    };
    let owner = common::create_user(&pool).await;
    let member = common::create_user(&pool).await;
    let conversation = ConversationService::create_group(&pool, "room", owner)
        .await
        .unwrap();

    ConversationService::add_participant(&pool, conversation.id, member, ParticipantRole::Member)
        .await
        .unwrap();
    ConversationService::add_participant(&pool, conversation.id, member, ParticipantRole::Member)
        .await
        .unwrap();

    let count = ConversationService::count_participants(&pool, conversation.id)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn direct_conversations_refuse_new_participants() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: no test database configured");
        return;
    };
    let (conversation_id, _, _) = common::direct_conversation(&pool).await;
    let intruder = common::create_user(&pool).await;

    let err = ConversationService::add_participant(
        &pool,
        conversation_id,
        intruder,
        ParticipantRole::Member,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
