mod common;

use messenger_service::models::ParticipantRole;
use messenger_service::services::conversation_service::ConversationService;

#[tokio::test]
async fn summaries_carry_participant_usernames() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: no test database configured");
        return;
    };
    let (conversation_id, a, _) = common::direct_conversation(&pool).await;

    let summaries = ConversationService::list_for_user(&pool, a).await.unwrap();
    let summary = summaries
        .iter()
        .find(|s| s.id == conversation_id)
        .expect("conversation listed for its participant");
    assert_eq!(summary.participant_usernames.len(), 2);
    assert!(summary.participant_usernames.iter().all(|u| !u.is_empty()));
}

#[tokio::test]
async fn group_summary_lists_members_in_join_order() {
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

    let summaries = ConversationService::list_for_user(&pool, member).await.unwrap();
    let summary = summaries
        .iter()
        .find(|s| s.id == conversation.id)
        .expect("group listed for its member");
    let participants = ConversationService::participants(&pool, conversation.id)
        .await
        .unwrap();
    let expected: Vec<String> = participants.into_iter().map(|p| p.username).collect();
    assert_eq!(summary.participant_usernames, expected);
}
