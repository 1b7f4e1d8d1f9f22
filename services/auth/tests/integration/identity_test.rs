use std::sync::atomic::Ordering;

use futures::future::join_all;

use tollgate_auth::error::AuthServiceError;
use tollgate_auth::usecase::identity::{PhoneMatch, Resolution, ResolveOrCreateInput};
use tollgate_domain::contact::{Contact, ContactKind, is_placeholder_phone};

use crate::helpers::{EMAIL, Harness, PHONE, test_user};

fn input(kind: ContactKind, key: &str) -> ResolveOrCreateInput {
    ResolveOrCreateInput {
        identity_key: key.into(),
        identity_type: kind,
        name: None,
    }
}

#[tokio::test]
async fn should_create_unverified_user_for_unknown_phone() {
    let h = Harness::new();

    let out = h
        .resolve_or_create()
        .execute(ResolveOrCreateInput {
            name: Some(" Bob ".into()),
            ..input(ContactKind::Phone, PHONE)
        })
        .await
        .unwrap();

    assert!(out.is_new);
    assert!(!out.user.is_verified);
    assert_eq!(out.user.phone, PHONE);
    assert_eq!(out.user.name, "Bob");
}

#[tokio::test]
async fn should_return_existing_user_on_second_call() {
    let h = Harness::new();
    let usecase = h.resolve_or_create();

    let first = usecase
        .execute(input(ContactKind::Phone, PHONE))
        .await
        .unwrap();
    let second = usecase
        .execute(input(ContactKind::Phone, PHONE))
        .await
        .unwrap();

    assert!(first.is_new);
    assert!(!second.is_new);
    assert_eq!(first.user.id, second.user.id);
}

#[tokio::test]
async fn should_match_phone_by_last_ten_digits() {
    let h = Harness::new();
    let existing = test_user(PHONE);
    h.users.seed(existing.clone());

    let out = h
        .resolve_or_create()
        .execute(input(ContactKind::Phone, "+19876543210"))
        .await
        .unwrap();

    assert!(!out.is_new);
    assert_eq!(out.user.id, existing.id);
}

#[tokio::test]
async fn should_match_email_case_insensitively() {
    let h = Harness::new();
    let mut existing = test_user("+14155550123");
    existing.email = Some(EMAIL.into());
    h.users.seed(existing.clone());

    let out = h
        .resolve_or_create()
        .execute(input(ContactKind::Email, "Alice@EXAMPLE.com"))
        .await
        .unwrap();

    assert_eq!(out.user.id, existing.id);
}

#[tokio::test]
async fn should_give_email_users_unique_placeholder_phones() {
    let h = Harness::new();
    let usecase = h.resolve_or_create();

    let a = usecase
        .execute(input(ContactKind::Email, "a@example.com"))
        .await
        .unwrap();
    let b = usecase
        .execute(input(ContactKind::Email, "b@example.com"))
        .await
        .unwrap();

    assert!(is_placeholder_phone(&a.user.phone));
    assert!(is_placeholder_phone(&b.user.phone));
    assert_ne!(a.user.phone, b.user.phone);
}

#[tokio::test]
async fn should_reject_malformed_identity_key() {
    let h = Harness::new();

    let result = h
        .resolve_or_create()
        .execute(input(ContactKind::Email, "not-an-email"))
        .await;

    assert!(
        matches!(result, Err(AuthServiceError::Validation(_))),
        "expected Validation, got {result:?}"
    );
}

#[tokio::test]
async fn should_surface_retry_exhausted_as_internal() {
    let h = Harness::new();
    h.users.phantom_duplicates.store(true, Ordering::SeqCst);

    let resolution = h
        .resolver()
        .resolve(
            &Contact::Phone(PHONE.into()),
            PhoneMatch::Exact,
            None,
            true,
        )
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::RetryExhausted);

    let result = h
        .resolve_or_create()
        .execute(input(ContactKind::Phone, PHONE))
        .await;
    assert!(
        matches!(result, Err(AuthServiceError::Internal(_))),
        "expected Internal, got {result:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_create_one_user_under_concurrent_resolution() {
    let h = Harness::new();
    let usecase = h.resolve_or_create();

    let results = join_all((0..16).map(|_| usecase.execute(input(ContactKind::Phone, PHONE)))).await;

    let outputs: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(h.users.all().len(), 1);
    assert_eq!(outputs.iter().filter(|o| o.is_new).count(), 1);
    let id = h.users.all()[0].id;
    assert!(outputs.iter().all(|o| o.user.id == id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_create_one_email_user_under_concurrent_resolution() {
    let h = Harness::new();
    let resolver = h.resolver();
    let contact = Contact::Email(EMAIL.into());

    let results = join_all(
        (0..16).map(|_| resolver.resolve(&contact, PhoneMatch::Exact, None, false)),
    )
    .await;

    let created = results
        .iter()
        .filter(|r| matches!(r, Ok(Resolution::CreatedNew(_))))
        .count();
    assert_eq!(created, 1, "{results:?}");
    assert_eq!(h.users.all().len(), 1);
}
