use futures::future::join_all;

use tollgate_auth::domain::types::AuditAction;
use tollgate_auth::error::AuthServiceError;
use tollgate_auth::usecase::token::{LOGOUT_ALL_MESSAGE, LOGOUT_MESSAGE};
use tollgate_domain::user::UserStatus;
use uuid::Uuid;

use crate::helpers::{Harness, PHONE, client};

// ── TokenIssuer ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_issue_distinct_refresh_tokens_within_the_same_second() {
    let h = Harness::new();
    let user = h.login(PHONE).await.user;
    let issuer = h.issuer();

    let a = issuer.issue_pair(&user).await.unwrap();
    let b = issuer.issue_pair(&user).await.unwrap();

    assert_ne!(a.refresh_token, b.refresh_token);
    assert_eq!(h.tokens.for_user(user.id).len(), 3);
}

#[tokio::test]
async fn should_store_refresh_token_with_its_expiry() {
    let h = Harness::new();

    let out = h.login(PHONE).await;

    let stored = h.tokens.for_user(out.user.id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token, out.tokens.refresh_token);
    assert_eq!(
        stored[0].expires_at,
        crate::helpers::t0() + chrono::Duration::days(7)
    );
}

// ── RefreshTokenUseCase ──────────────────────────────────────────────────────

#[tokio::test]
async fn should_rotate_and_reject_the_old_token() {
    let h = Harness::new();
    let login = h.login(PHONE).await;
    let refresh = h.refresh();

    let rotated = refresh
        .execute(&login.tokens.refresh_token, &client())
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, login.tokens.refresh_token);
    assert!(h.verifier().verify_access(&rotated.access_token).is_ok());

    let result = refresh.execute(&login.tokens.refresh_token, &client()).await;
    assert!(
        matches!(result, Err(AuthServiceError::InvalidRefreshToken)),
        "expected InvalidRefreshToken, got {result:?}"
    );

    let audited = h.audit.last(AuditAction::TokenRefreshed).unwrap();
    assert_eq!(audited.user_id, Some(login.user.id));
}

#[tokio::test]
async fn should_leave_one_session_after_rotation() {
    let h = Harness::new();
    let phone_session = h.login(PHONE).await;
    let laptop_session = h.login(PHONE).await;
    assert_eq!(h.tokens.for_user(phone_session.user.id).len(), 2);

    let rotated = h
        .refresh()
        .execute(&phone_session.tokens.refresh_token, &client())
        .await
        .unwrap();

    let stored = h.tokens.for_user(phone_session.user.id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token, rotated.refresh_token);

    let result = h
        .refresh()
        .execute(&laptop_session.tokens.refresh_token, &client())
        .await;
    assert!(
        matches!(result, Err(AuthServiceError::InvalidRefreshToken)),
        "expected InvalidRefreshToken, got {result:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_let_exactly_one_concurrent_rotation_win() {
    let h = Harness::new();
    let login = h.login(PHONE).await;
    let refresh = h.refresh();
    let c = client();

    let results = join_all(
        (0..8).map(|_| refresh.execute(&login.tokens.refresh_token, &c)),
    )
    .await;

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "{results:?}");
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AuthServiceError::InvalidRefreshToken)),
        "{results:?}"
    );
    let stored = h.tokens.for_user(login.user.id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token, winners[0].refresh_token);
}

#[tokio::test]
async fn should_reject_expired_refresh_token() {
    let h = Harness::new();
    let login = h.login(PHONE).await;
    h.clock.advance(chrono::Duration::days(7) + chrono::Duration::seconds(1));

    let result = h
        .refresh()
        .execute(&login.tokens.refresh_token, &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidRefreshToken)),
        "expected InvalidRefreshToken, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_access_token_presented_as_refresh() {
    let h = Harness::new();
    let login = h.login(PHONE).await;

    let result = h
        .refresh()
        .execute(&login.tokens.access_token, &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::InvalidRefreshToken)),
        "expected InvalidRefreshToken, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_garbage_and_blank_refresh_tokens() {
    let h = Harness::new();

    let garbage = h.refresh().execute("not-a-jwt", &client()).await;
    let blank = h.refresh().execute("   ", &client()).await;

    assert!(
        matches!(garbage, Err(AuthServiceError::InvalidRefreshToken)),
        "expected InvalidRefreshToken, got {garbage:?}"
    );
    assert!(
        matches!(blank, Err(AuthServiceError::Validation(_))),
        "expected Validation, got {blank:?}"
    );
}

#[tokio::test]
async fn should_reject_refresh_for_suspended_user() {
    let h = Harness::new();
    let login = h.login(PHONE).await;
    h.users
        .users
        .lock()
        .unwrap()
        .iter_mut()
        .for_each(|u| u.status = UserStatus::Suspended);

    let result = h
        .refresh()
        .execute(&login.tokens.refresh_token, &client())
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::AccountInactive)),
        "expected AccountInactive, got {result:?}"
    );
    assert_eq!(h.tokens.for_user(login.user.id).len(), 1);
}

// ── LogoutUseCase ────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_log_out_single_session() {
    let h = Harness::new();
    let first = h.login(PHONE).await;
    let second = h.login(PHONE).await;

    let out = h
        .logout()
        .execute(first.user.id, Some(&first.tokens.refresh_token), &client())
        .await
        .unwrap();

    assert_eq!(out.message, LOGOUT_MESSAGE);
    assert_eq!(out.revoked, 1);
    let stored = h.tokens.for_user(first.user.id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token, second.tokens.refresh_token);
    let audited = h.audit.last(AuditAction::UserLogout).unwrap();
    assert_eq!(audited.metadata.unwrap()["allDevices"], false);
}

#[tokio::test]
async fn should_log_out_all_sessions_without_token() {
    let h = Harness::new();
    let first = h.login(PHONE).await;
    h.login(PHONE).await;

    let out = h
        .logout()
        .execute(first.user.id, None, &client())
        .await
        .unwrap();

    assert_eq!(out.message, LOGOUT_ALL_MESSAGE);
    assert_eq!(out.revoked, 2);
    assert!(h.tokens.for_user(first.user.id).is_empty());
    let audited = h.audit.last(AuditAction::UserLogout).unwrap();
    assert_eq!(audited.metadata.unwrap()["allDevices"], true);
}

#[tokio::test]
async fn should_treat_blank_logout_token_as_all_devices() {
    let h = Harness::new();
    let login = h.login(PHONE).await;

    let out = h
        .logout()
        .execute(login.user.id, Some("  "), &client())
        .await
        .unwrap();

    assert_eq!(out.message, LOGOUT_ALL_MESSAGE);
}

#[tokio::test]
async fn should_not_revoke_another_users_token() {
    let h = Harness::new();
    let victim = h.login(PHONE).await;
    let attacker = h.login("+14155550123").await;

    let out = h
        .logout()
        .execute(attacker.user.id, Some(&victim.tokens.refresh_token), &client())
        .await
        .unwrap();

    assert_eq!(out.revoked, 0);
    assert_eq!(h.tokens.for_user(victim.user.id).len(), 1);
}

#[tokio::test]
async fn should_fail_logout_for_unknown_user() {
    let h = Harness::new();

    let result = h.logout().execute(Uuid::now_v7(), None, &client()).await;

    assert!(
        matches!(result, Err(AuthServiceError::UserNotFound)),
        "expected UserNotFound, got {result:?}"
    );
}
