use std::sync::atomic::Ordering;

use tollgate_auth::domain::types::AuditAction;

use crate::helpers::{Harness, PHONE, client};

#[tokio::test]
async fn should_complete_login_when_audit_store_fails() {
    let h = Harness::new();
    h.audit.fail.store(true, Ordering::SeqCst);

    let code = h.send_code(PHONE).await;
    let result = h.verify_code(PHONE, &code).await;

    assert!(result.is_ok(), "expected Ok, got {result:?}");
    assert!(h.audit.all().is_empty());
}

#[tokio::test]
async fn should_stamp_entries_with_client_and_clock() {
    let h = Harness::new();

    h.login(PHONE).await;

    let entries = h.audit.all();
    assert!(!entries.is_empty());
    for entry in &entries {
        assert_eq!(entry.ip_address, client().ip_address);
        assert_eq!(entry.user_agent, client().user_agent);
        assert_eq!(entry.created_at, crate::helpers::t0());
        assert_eq!(entry.identifier, PHONE);
    }
    assert_eq!(
        h.audit.actions(),
        vec![
            AuditAction::OtpSent,
            AuditAction::UserSignup,
            AuditAction::OtpVerified,
            AuditAction::UserLoginOtp,
        ]
    );
}

#[tokio::test]
async fn should_never_record_secrets() {
    let h = Harness::new();
    let code = h.send_code(PHONE).await;
    let out = h.verify_code(PHONE, &code).await.unwrap();
    h.set_passkey()
        .execute(out.user.id, "4821", &client())
        .await
        .unwrap();

    for entry in h.audit.all() {
        let metadata = entry
            .metadata
            .map(|m| m.to_string())
            .unwrap_or_default();
        assert!(!metadata.contains(&code), "{metadata}");
        assert!(!metadata.contains("4821"), "{metadata}");
        assert!(!metadata.contains(&out.tokens.refresh_token), "{metadata}");
    }
}
