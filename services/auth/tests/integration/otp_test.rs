use std::sync::atomic::Ordering;

use futures::future::join_all;

use tollgate_auth::domain::repository::OtpChannel;
use tollgate_auth::domain::types::AuditAction;
use tollgate_auth::error::AuthServiceError;
use tollgate_auth::usecase::otp::{OTP_SENT_MESSAGE, SendOtpInput, VerifyOtpInput};
use tollgate_domain::contact::is_placeholder_phone;
use tollgate_domain::user::UserStatus;

use crate::helpers::{EMAIL, Harness, PHONE, client, test_user};

// ── SendOtpUseCase ───────────────────────────────────────────────────────────

#[tokio::test]
async fn should_issue_code_and_dispatch_sms_for_phone() {
    let h = Harness::new();

    let out = h
        .send_otp()
        .execute(
            SendOtpInput {
                phone: Some("+91 98765-43210".into()),
                email: None,
            },
            &client(),
        )
        .await
        .unwrap();

    assert_eq!(out.message, OTP_SENT_MESSAGE);
    assert_eq!(out.expires_in, 300);

    let codes = h.otps.all();
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0].identifier, PHONE);
    assert_eq!(codes[0].code.len(), 6);
    assert_eq!(codes[0].expires_at, crate::helpers::t0() + chrono::Duration::minutes(5));

    let deliveries = h.dispatcher.deliveries.lock().unwrap().clone();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].channel, OtpChannel::Sms);
    assert_eq!(deliveries[0].recipient, PHONE);
    assert_eq!(deliveries[0].code, codes[0].code);
    assert_eq!(deliveries[0].ttl_minutes, 5);

    let sent = h.audit.last(AuditAction::OtpSent).unwrap();
    assert_eq!(sent.identifier, PHONE);
    assert!(sent.success);
    assert!(sent.metadata.unwrap().get("expiresAt").is_some());
}

#[tokio::test]
async fn should_send_email_code_through_email_channel() {
    let h = Harness::new();

    h.send_otp()
        .execute(
            SendOtpInput {
                phone: None,
                email: Some("  Alice@Example.COM ".into()),
            },
            &client(),
        )
        .await
        .unwrap();

    let deliveries = h.dispatcher.deliveries.lock().unwrap().clone();
    assert_eq!(deliveries[0].channel, OtpChannel::Email);
    assert_eq!(deliveries[0].recipient, EMAIL);
    assert_eq!(h.otps.all()[0].identifier, EMAIL);
}

#[tokio::test]
async fn should_prefer_phone_when_both_contacts_given() {
    let h = Harness::new();

    h.send_otp()
        .execute(
            SendOtpInput {
                phone: Some(PHONE.into()),
                email: Some(EMAIL.into()),
            },
            &client(),
        )
        .await
        .unwrap();

    assert_eq!(h.otps.all()[0].identifier, PHONE);
}

#[tokio::test]
async fn should_reject_send_without_contact() {
    let h = Harness::new();

    let result = h
        .send_otp()
        .execute(SendOtpInput::default(), &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::Validation(_))),
        "expected Validation, got {result:?}"
    );
    assert!(h.otps.all().is_empty());
}

#[tokio::test]
async fn should_reject_phone_without_country_code() {
    let h = Harness::new();

    let result = h
        .send_otp()
        .execute(
            SendOtpInput {
                phone: Some("9876543210".into()),
                email: None,
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
async fn should_succeed_when_dispatch_fails() {
    let h = Harness::new();
    h.dispatcher.fail.store(true, Ordering::SeqCst);

    let result = h
        .send_otp()
        .execute(
            SendOtpInput {
                phone: Some(PHONE.into()),
                email: None,
            },
            &client(),
        )
        .await;

    assert!(result.is_ok(), "expected Ok, got {result:?}");
    assert_eq!(h.otps.all().len(), 1);
}

// ── VerifyOtpUseCase ─────────────────────────────────────────────────────────

#[tokio::test]
async fn should_create_verified_user_on_first_login() {
    let h = Harness::new();
    let code = h.send_code(PHONE).await;

    let out = h
        .verify_otp()
        .execute(
            VerifyOtpInput {
                phone: Some(PHONE.into()),
                email: None,
                otp: code,
                name: Some("  Alice  ".into()),
            },
            &client(),
        )
        .await
        .unwrap();

    assert!(out.is_new_user);
    assert!(out.user.is_verified);
    assert_eq!(out.user.phone, PHONE);
    assert_eq!(out.user.name, "Alice");
    assert_eq!(h.users.all().len(), 1);

    let info = h.verifier().verify_access(&out.tokens.access_token).unwrap();
    assert_eq!(info.user_id, out.user.id);
    assert_eq!(info.phone, PHONE);
    assert_eq!(out.tokens.expires_in, 900);
    assert_eq!(h.tokens.for_user(out.user.id).len(), 1);

    let actions = h.audit.actions();
    assert!(actions.contains(&AuditAction::UserSignup), "{actions:?}");
    assert!(actions.contains(&AuditAction::OtpVerified), "{actions:?}");
    assert!(actions.contains(&AuditAction::UserLoginOtp), "{actions:?}");
    let verified = h.audit.last(AuditAction::OtpVerified).unwrap();
    assert_eq!(verified.user_id, Some(out.user.id));
    assert_eq!(verified.metadata.unwrap()["isNewUser"], true);

    let onboarded = h.notifier.requests.lock().unwrap().clone();
    assert_eq!(onboarded.len(), 1);
    assert_eq!(onboarded[0].user_id, out.user.id);
    assert_eq!(onboarded[0].phone.as_deref(), Some(PHONE));
}

#[tokio::test]
async fn should_default_name_for_new_user() {
    let h = Harness::new();

    let out = h.login(PHONE).await;

    assert_eq!(out.user.name, "Guest");
}

#[tokio::test]
async fn should_log_in_existing_user_and_mark_verified() {
    let h = Harness::new();
    let mut existing = test_user(PHONE);
    existing.is_verified = false;
    h.users.seed(existing.clone());

    let out = h.login(PHONE).await;

    assert!(!out.is_new_user);
    assert_eq!(out.user.id, existing.id);
    assert!(out.user.is_verified);
    assert!(h.users.get(existing.id).unwrap().is_verified);
    assert!(!h.audit.actions().contains(&AuditAction::UserSignup));
}

#[tokio::test]
async fn should_reject_replayed_code() {
    let h = Harness::new();
    let code = h.send_code(PHONE).await;
    h.verify_code(PHONE, &code).await.unwrap();

    let result = h.verify_code(PHONE, &code).await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidOtp)),
        "expected InvalidOtp, got {result:?}"
    );
}

#[tokio::test]
async fn should_burn_older_codes_when_newer_one_is_used() {
    let h = Harness::new();
    let first = h.send_code(PHONE).await;
    let second = h.send_code(PHONE).await;
    // Identical codes would make the assertion meaningless.
    if first == second {
        return;
    }

    h.verify_code(PHONE, &second).await.unwrap();
    let result = h.verify_code(PHONE, &first).await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidOtp)),
        "expected InvalidOtp, got {result:?}"
    );
    assert!(h.otps.all().iter().all(|c| c.used));
}

#[tokio::test]
async fn should_reject_expired_code() {
    let h = Harness::new();
    let code = h.send_code(PHONE).await;
    h.clock.advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));

    let result = h.verify_code(PHONE, &code).await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidOtp)),
        "expected InvalidOtp, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_wrong_code_and_record_failure() {
    let h = Harness::new();
    let code = h.send_code(PHONE).await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let result = h.verify_code(PHONE, wrong).await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidOtp)),
        "expected InvalidOtp, got {result:?}"
    );
    let failed = h.audit.last(AuditAction::OtpFailed).unwrap();
    assert!(!failed.success);
    assert_eq!(failed.metadata.unwrap()["reason"], "Invalid or expired OTP");
    assert!(h.users.all().is_empty());
}

#[tokio::test]
async fn should_reject_non_numeric_code_before_lookup() {
    let h = Harness::new();

    let result = h.verify_code(PHONE, "12ab56").await;

    assert!(
        matches!(result, Err(AuthServiceError::Validation(_))),
        "expected Validation, got {result:?}"
    );
    assert!(h.buckets.buckets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_create_placeholder_phone_user_for_email_login() {
    let h = Harness::new();
    h.send_otp()
        .execute(
            SendOtpInput {
                phone: None,
                email: Some(EMAIL.into()),
            },
            &client(),
        )
        .await
        .unwrap();
    let code = h.dispatcher.last_code(EMAIL).unwrap();

    let out = h
        .verify_otp()
        .execute(
            VerifyOtpInput {
                phone: None,
                email: Some("ALICE@example.com".into()),
                otp: code,
                name: None,
            },
            &client(),
        )
        .await
        .unwrap();

    assert!(out.is_new_user);
    assert_eq!(out.user.email.as_deref(), Some(EMAIL));
    assert!(is_placeholder_phone(&out.user.phone));
    assert!(out.user.real_phone().is_none());
    let onboarded = h.notifier.requests.lock().unwrap().clone();
    assert_eq!(onboarded[0].phone, None);
    assert_eq!(onboarded[0].email.as_deref(), Some(EMAIL));
}

#[tokio::test]
async fn should_not_match_login_phone_by_suffix() {
    let h = Harness::new();
    let existing = test_user(PHONE);
    h.users.seed(existing.clone());

    let out = h.login("+19876543210").await;

    assert!(out.is_new_user);
    assert_ne!(out.user.id, existing.id);
    assert_eq!(h.users.all().len(), 2);
}

#[tokio::test]
async fn should_reject_suspended_user() {
    let h = Harness::new();
    let mut suspended = test_user(PHONE);
    suspended.status = UserStatus::Suspended;
    h.users.seed(suspended);
    let code = h.send_code(PHONE).await;

    let result = h.verify_code(PHONE, &code).await;

    assert!(
        matches!(result, Err(AuthServiceError::AccountInactive)),
        "expected AccountInactive, got {result:?}"
    );
    assert!(h.tokens.all().is_empty());
}

#[tokio::test]
async fn should_succeed_when_onboard_hand_off_fails() {
    let h = Harness::new();
    h.notifier.fail.store(true, Ordering::SeqCst);
    let code = h.send_code(PHONE).await;

    let result = h.verify_code(PHONE, &code).await;

    assert!(result.is_ok(), "expected Ok, got {result:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_let_exactly_one_concurrent_verify_win() {
    let h = Harness::new();
    let code = h.send_code(PHONE).await;

    let results = join_all((0..5).map(|_| h.verify_code(PHONE, &code))).await;

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "{results:?}");
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AuthServiceError::InvalidOtp)),
        "{results:?}"
    );
    assert_eq!(h.users.all().len(), 1);
}
