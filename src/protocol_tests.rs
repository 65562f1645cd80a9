use super::*;

#[test]
fn join_frame_deserializes_with_camel_case_fields() {
    let json = r#"{"type":"join","meetingId":"m1","userId":"a","displayName":"Alice"}"#;
    let frame: ClientFrame = serde_json::from_str(json).expect("valid join frame");
    match frame {
        ClientFrame::Join { meeting_id, user_id, display_name } => {
            assert_eq!(meeting_id, "m1");
            assert_eq!(user_id, "a");
            assert_eq!(display_name, "Alice");
        }
        _ => panic!("expected Join"),
    }
}

#[test]
fn unknown_type_fails_to_deserialize() {
    let json = r#"{"type":"teleport","meetingId":"m1"}"#;
    assert!(serde_json::from_str::<ClientFrame>(json).is_err());
}

#[test]
fn missing_required_field_fails_to_deserialize() {
    let json = r#"{"type":"offer","meetingId":"m1"}"#;
    assert!(serde_json::from_str::<ClientFrame>(json).is_err());
}

#[test]
fn frame_fingerprint_accepts_either_sender_or_receiver_user_id() {
    let sender_side =
        r#"{"type":"frame-fingerprint","frameId":"f1","crc32":"AABBCCDD","timestamp":1,"senderUserId":"s"}"#;
    let frame: ClientFrame = serde_json::from_str(sender_side).expect("valid");
    match frame {
        ClientFrame::FrameFingerprint { sender_user_id, receiver_user_id, .. } => {
            assert_eq!(sender_user_id.as_deref(), Some("s"));
            assert!(receiver_user_id.is_none());
        }
        _ => panic!("expected FrameFingerprint"),
    }
}

#[test]
fn ice_candidate_round_trips_required_fields() {
    let json = r#"{"type":"ice-candidate","meetingId":"m1","candidate":"c","sdpMid":"0","sdpMLineIndex":0}"#;
    let frame: ClientFrame = serde_json::from_str(json).expect("valid");
    assert!(matches!(frame, ClientFrame::IceCandidate { .. }));
}

#[test]
fn tier_change_serializes_with_kebab_case_tag_and_camel_case_fields() {
    let frame = ServerFrame::TierChange { tier: Tier::Low, timestamp: 42 };
    let json = serde_json::to_value(&frame).expect("serialize");
    assert_eq!(json["type"], "tier-change");
    assert_eq!(json["tier"], "LOW");
    assert_eq!(json["timestamp"], 42);
}

#[test]
fn ack_summary_serializes_camel_case_fields() {
    let frame = ServerFrame::AckSummary {
        meeting_id: "m1".to_owned(),
        acked_users: vec!["a".to_owned()],
        missing_users: vec!["b".to_owned()],
        timestamp: 1000,
    };
    let json = serde_json::to_value(&frame).expect("serialize");
    assert_eq!(json["type"], "ack-summary");
    assert_eq!(json["meetingId"], "m1");
    assert_eq!(json["ackedUsers"][0], "a");
    assert_eq!(json["missingUsers"][0], "b");
}

#[test]
fn error_frame_serializes_code_and_message() {
    let frame = ServerFrame::Error { code: 404, message: "not in meeting".to_owned() };
    let json = serde_json::to_value(&frame).expect("serialize");
    assert_eq!(json["type"], "error");
    assert_eq!(json["code"], 404);
    assert_eq!(json["message"], "not in meeting");
}
