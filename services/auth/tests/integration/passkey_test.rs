use tollgate_auth::domain::types::AuditAction;
use tollgate_auth::error::AuthServiceError;
use tollgate_auth::usecase::passkey::PasskeyLoginInput;
use tollgate_domain::user::UserStatus;
use uuid::Uuid;

use crate::helpers::{Harness, PHONE, client, test_user};

fn login_input(phone: &str, passkey: &str) -> PasskeyLoginInput {
    PasskeyLoginInput {
        phone: phone.into(),
        passkey: passkey.into(),
    }
}

// ── SetPasskeyUseCase ────────────────────────────────────────────────────────

#[tokio::test]
async fn should_store_hash_not_plain_passkey() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());

    h.set_passkey()
        .execute(user.id, "4821", &client())
        .await
        .unwrap();

    let stored = h.users.get(user.id).unwrap().passkey_hash.unwrap();
    assert_ne!(stored, "4821");
    assert!(h.hasher.verify("4821", &stored).unwrap());
    let audited = h.audit.last(AuditAction::PasskeySet).unwrap();
    assert_eq!(audited.user_id, Some(user.id));
}

#[tokio::test]
async fn should_reject_passkey_outside_length_bounds() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());

    for passkey in ["123", "123456789012345678901"] {
        let result = h.set_passkey().execute(user.id, passkey, &client()).await;
        assert!(
            matches!(result, Err(AuthServiceError::Validation(_))),
            "expected Validation for {passkey:?}, got {result:?}"
        );
    }
    assert!(h.users.get(user.id).unwrap().passkey_hash.is_none());
}

#[tokio::test]
async fn should_fail_set_passkey_for_unknown_user() {
    let h = Harness::new();

    let result = h
        .set_passkey()
        .execute(Uuid::now_v7(), "4821", &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::UserNotFound)),
        "expected UserNotFound, got {result:?}"
    );
}

// ── PasskeyLoginUseCase ──────────────────────────────────────────────────────

#[tokio::test]
async fn should_log_in_with_correct_passkey() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());
    h.set_passkey()
        .execute(user.id, "4821", &client())
        .await
        .unwrap();

    let out = h
        .passkey_login()
        .execute(login_input("+91 98765 43210", "4821"), &client())
        .await
        .unwrap();

    assert!(!out.is_new_user);
    assert_eq!(out.user.id, user.id);
    assert_eq!(
        h.verifier()
            .verify_access(&out.tokens.access_token)
            .unwrap()
            .user_id,
        user.id
    );
    assert_eq!(h.tokens.for_user(user.id).len(), 1);
    assert!(h.audit.actions().contains(&AuditAction::UserLoginPasskey));
    assert_eq!(h.notifier.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_reject_wrong_passkey_and_record_failure() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());
    h.set_passkey()
        .execute(user.id, "4821", &client())
        .await
        .unwrap();

    let result = h
        .passkey_login()
        .execute(login_input(PHONE, "9999"), &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidPasskey)),
        "expected InvalidPasskey, got {result:?}"
    );
    let failed = h.audit.last(AuditAction::PasskeyLoginFailed).unwrap();
    assert!(!failed.success);
    assert_eq!(failed.user_id, Some(user.id));
    assert!(h.tokens.all().is_empty());
}

#[tokio::test]
async fn should_require_passkey_to_be_set() {
    let h = Harness::new();
    h.users.seed(test_user(PHONE));

    let result = h
        .passkey_login()
        .execute(login_input(PHONE, "4821"), &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::PasskeyNotSet)),
        "expected PasskeyNotSet, got {result:?}"
    );
}

#[tokio::test]
async fn should_report_unknown_phone() {
    let h = Harness::new();

    let result = h
        .passkey_login()
        .execute(login_input(PHONE, "4821"), &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::UserNotFound)),
        "expected UserNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn should_not_match_passkey_login_by_phone_suffix() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());
    h.set_passkey()
        .execute(user.id, "4821", &client())
        .await
        .unwrap();

    let result = h
        .passkey_login()
        .execute(login_input("+19876543210", "4821"), &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::UserNotFound)),
        "expected UserNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_suspended_passkey_user() {
    let h = Harness::new();
    let mut user = test_user(PHONE);
    user.status = UserStatus::Suspended;
    user.passkey_hash = Some(h.hasher.hash("4821").unwrap());
    h.users.seed(user);

    let result = h
        .passkey_login()
        .execute(login_input(PHONE, "4821"), &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::AccountInactive)),
        "expected AccountInactive, got {result:?}"
    );
}

#[tokio::test]
async fn should_rate_limit_passkey_guessing() {
    let h = Harness::new();
    let mut user = test_user(PHONE);
    user.passkey_hash = Some(h.hasher.hash("4821").unwrap());
    h.users.seed(user);
    let login = h.passkey_login();

    for _ in 0..5 {
        let result = login.execute(login_input(PHONE, "0000"), &client()).await;
        assert!(matches!(result, Err(AuthServiceError::InvalidPasskey)), "{result:?}");
    }
    let result = login.execute(login_input(PHONE, "4821"), &client()).await;

    assert!(
        matches!(result, Err(AuthServiceError::RateLimited { .. })),
        "expected RateLimited, got {result:?}"
    );
}
