use tollgate_auth::domain::types::AuditAction;
use tollgate_auth::error::AuthServiceError;
use tollgate_auth::usecase::user::UpdateProfileInput;
use uuid::Uuid;

use crate::helpers::{EMAIL, Harness, PHONE, client, test_user};

// ── GetCurrentUserUseCase ────────────────────────────────────────────────────

#[tokio::test]
async fn should_return_current_user() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());

    let found = h.current_user().execute(user.id).await.unwrap();

    assert_eq!(found, user);
}

#[tokio::test]
async fn should_report_missing_current_user() {
    let h = Harness::new();

    let result = h.current_user().execute(Uuid::now_v7()).await;

    assert!(
        matches!(result, Err(AuthServiceError::UserNotFound)),
        "expected UserNotFound, got {result:?}"
    );
}

// ── UpdateProfileUseCase ─────────────────────────────────────────────────────

#[tokio::test]
async fn should_update_name_and_email() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());
    h.clock.advance(chrono::Duration::minutes(1));

    let updated = h
        .update_profile()
        .execute(
            user.id,
            UpdateProfileInput {
                name: Some("  Alice Cooper ".into()),
                email: Some(" ALICE@example.com".into()),
            },
            &client(),
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Alice Cooper");
    assert_eq!(updated.email.as_deref(), Some(EMAIL));
    assert!(updated.updated_at > user.updated_at);
    let audited = h.audit.last(AuditAction::ProfileUpdated).unwrap();
    assert_eq!(
        audited.metadata.unwrap()["updatedFields"],
        serde_json::json!(["name", "email"])
    );
}

#[tokio::test]
async fn should_ignore_blank_and_unchanged_fields() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());

    let unchanged = h
        .update_profile()
        .execute(
            user.id,
            UpdateProfileInput {
                name: Some(user.name.clone()),
                email: Some("   ".into()),
            },
            &client(),
        )
        .await
        .unwrap();

    assert_eq!(unchanged, user);
    assert!(h.audit.all().is_empty());
}

#[tokio::test]
async fn should_reject_email_owned_by_another_user() {
    let h = Harness::new();
    let mut owner = test_user("+14155550123");
    owner.email = Some(EMAIL.into());
    let user = test_user(PHONE);
    h.users.seed(owner);
    h.users.seed(user.clone());

    let result = h
        .update_profile()
        .execute(
            user.id,
            UpdateProfileInput {
                name: None,
                email: Some("Alice@Example.com".into()),
            },
            &client(),
        )
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::EmailInUse)),
        "expected EmailInUse, got {result:?}"
    );
    assert!(h.users.get(user.id).unwrap().email.is_none());
}

#[tokio::test]
async fn should_reject_name_outside_length_bounds() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());

    for name in ["A".to_string(), "x".repeat(51)] {
        let result = h
            .update_profile()
            .execute(
                user.id,
                UpdateProfileInput {
                    name: Some(name.clone()),
                    email: None,
                },
                &client(),
            )
            .await;
        assert!(
            matches!(result, Err(AuthServiceError::Validation(_))),
            "expected Validation for {name:?}, got {result:?}"
        );
    }
}

#[tokio::test]
async fn should_reject_malformed_email() {
    let h = Harness::new();
    let user = test_user(PHONE);
    h.users.seed(user.clone());

    let result = h
        .update_profile()
        .execute(
            user.id,
            UpdateProfileInput {
                name: None,
                email: Some("alice@".into()),
            },
            &client(),
        )
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::Validation(_))),
        "expected Validation, got {result:?}"
    );
}

#[tokio::test]
async fn should_report_missing_user_on_update() {
    let h = Harness::new();

    let result = h
        .update_profile()
        .execute(
            Uuid::now_v7(),
            UpdateProfileInput {
                name: Some("Alice".into()),
                email: None,
            },
            &client(),
        )
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::UserNotFound)),
        "expected UserNotFound, got {result:?}"
    );
}
