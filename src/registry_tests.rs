use super::*;

fn user(id: &str) -> UserSession {
    UserSession::new(id, format!("pc-{id}"), 0)
}

#[tokio::test]
async fn register_creates_meeting_with_high_tier() {
    let reg = MeetingRegistry::new();
    reg.register_user("m1", user("a")).await;

    let meeting = reg.get_meeting("m1").await.expect("meeting exists");
    assert_eq!(meeting.current_tier, Tier::High);
    assert_eq!(meeting.sessions().len(), 1);
}

#[tokio::test]
async fn register_is_idempotent_and_preserves_order() {
    let reg = MeetingRegistry::new();
    reg.register_user("m1", user("a")).await;
    reg.register_user("m1", user("b")).await;
    reg.register_user("m1", user("c")).await;

    // Re-register "a" with a different pcId: replaces in place, no reorder.
    let mut updated = user("a");
    updated.pc_id = "pc-a-new".to_owned();
    reg.register_user("m1", updated).await;

    let recipients = reg.list_recipients("m1", None).await;
    let ids: Vec<&str> = recipients.iter().map(|s| s.user_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(recipients[0].pc_id, "pc-a-new");
}

#[tokio::test]
async fn list_recipients_excludes_requested_user() {
    let reg = MeetingRegistry::new();
    reg.register_user("m1", user("a")).await;
    reg.register_user("m1", user("b")).await;

    let recipients = reg.list_recipients("m1", Some("a")).await;
    let ids: Vec<&str> = recipients.iter().map(|s| s.user_id.as_str()).collect();
    assert_eq!(ids, vec!["b"]);
}

#[tokio::test]
async fn remove_last_user_destroys_meeting() {
    let reg = MeetingRegistry::new();
    reg.register_user("m1", user("a")).await;
    reg.remove_user("m1", "a").await;

    assert!(reg.get_meeting("m1").await.is_none());
}

#[tokio::test]
async fn remove_user_emits_events() {
    let reg = MeetingRegistry::new();
    let mut rx = reg.subscribe();
    reg.register_user("m1", user("a")).await;
    reg.remove_user("m1", "a").await;

    let first = rx.recv().await.expect("user removed event");
    assert!(matches!(first, RegistryEvent::UserRemoved { .. }));
    let second = rx.recv().await.expect("meeting destroyed event");
    assert!(matches!(second, RegistryEvent::MeetingDestroyed { .. }));
}

#[tokio::test]
async fn remove_user_keeps_meeting_when_others_remain() {
    let reg = MeetingRegistry::new();
    reg.register_user("m1", user("a")).await;
    reg.register_user("m1", user("b")).await;
    reg.remove_user("m1", "a").await;

    let meeting = reg.get_meeting("m1").await.expect("meeting still exists");
    assert_eq!(meeting.sessions().len(), 1);
}

#[tokio::test]
async fn remove_user_is_noop_on_unknown_meeting_or_user() {
    let reg = MeetingRegistry::new();
    // No panics, no state created.
    reg.remove_user("ghost", "a").await;
    assert!(reg.get_meeting("ghost").await.is_none());

    reg.register_user("m1", user("a")).await;
    reg.remove_user("m1", "nobody").await;
    assert_eq!(reg.get_meeting("m1").await.unwrap().sessions().len(), 1);
}

#[tokio::test]
async fn update_quality_tier_warns_silently_on_unknown_meeting() {
    let reg = MeetingRegistry::new();
    // Must not panic even though "ghost" was never registered.
    reg.update_quality_tier("ghost", Tier::Low).await;
}

#[tokio::test]
async fn update_quality_tier_applies_to_known_meeting() {
    let reg = MeetingRegistry::new();
    reg.register_user("m1", user("a")).await;
    reg.update_quality_tier("m1", Tier::Medium).await;
    assert_eq!(reg.get_meeting("m1").await.unwrap().current_tier, Tier::Medium);
}

/// Property 1: for all sequences of registerUser/removeUser, the set of
/// userIds visible via listRecipients(M) equals the multiset of distinct
/// userIds registered to M and not subsequently removed.
#[tokio::test]
async fn property_membership_matches_register_remove_sequence() {
    let reg = MeetingRegistry::new();
    let ops: &[(&str, bool)] =
        &[("a", true), ("b", true), ("c", true), ("a", false), ("d", true), ("b", false)];

    let mut expected: Vec<&str> = Vec::new();
    for (user_id, register) in ops {
        if *register {
            reg.register_user("m1", user(user_id)).await;
            if !expected.contains(user_id) {
                expected.push(user_id);
            }
        } else {
            reg.remove_user("m1", user_id).await;
            expected.retain(|u| u != user_id);
        }
    }

    let recipients = reg.list_recipients("m1", None).await;
    let ids: Vec<&str> = recipients.iter().map(|s| s.user_id.as_str()).collect();
    assert_eq!(ids, expected);
}
