use std::sync::Arc;

use anyhow::anyhow;

use tollgate_domain::clock::Clock;
use tollgate_domain::contact::{Contact, ContactKind, phone_suffix, placeholder_phone};
use tollgate_domain::id::IdGenerator;
use tollgate_domain::user::{UserRole, UserStatus};

use crate::domain::repository::{IdentityNotifier, OnboardRequest, UserRepository};
use crate::domain::types::{DEFAULT_USER_NAME, InsertOutcome, User};
use crate::error::AuthServiceError;
use crate::usecase::user::normalize_name;

/// Outcome of a find-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(User),
    CreatedNew(User),
    /// Insert hit a unique violation but the re-read found nothing. Not retryable.
    RetryExhausted,
}

/// How loosely a phone may match an existing user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneMatch {
    /// Login flows: the presented phone must equal the stored one.
    Exact,
    /// Service-to-service lookups: fall back to the last 10 digits, for callers that
    /// drop or mangle the country code.
    AllowSuffix,
}

/// Find-or-create for users keyed by phone or email, safe under concurrent callers.
///
/// Lookups never lock. A losing concurrent insert surfaces as a unique violation, after
/// which the winner's row is re-read exactly once. At most one row per identity is ever
/// observable.
pub struct IdentityResolver<U: UserRepository> {
    pub users: U,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<IdGenerator>,
}

impl<U: UserRepository> IdentityResolver<U> {
    pub async fn find(
        &self,
        contact: &Contact,
        phone_match: PhoneMatch,
    ) -> Result<Option<User>, AuthServiceError> {
        match contact {
            Contact::Phone(phone) => {
                if let Some(user) = self.users.find_by_phone(phone).await? {
                    return Ok(Some(user));
                }
                match (phone_match, phone_suffix(phone)) {
                    (PhoneMatch::AllowSuffix, Some(suffix)) => {
                        self.users.find_by_phone_suffix(suffix).await
                    }
                    _ => Ok(None),
                }
            }
            Contact::Email(email) => self.users.find_by_email(email).await,
        }
    }

    /// `name` is used only when a user is created; blank falls back to the default.
    pub async fn resolve(
        &self,
        contact: &Contact,
        phone_match: PhoneMatch,
        name: Option<&str>,
        verified: bool,
    ) -> Result<Resolution, AuthServiceError> {
        if let Some(user) = self.find(contact, phone_match).await? {
            return Ok(Resolution::Found(user));
        }

        let candidate = self.new_user(contact, name, verified);
        match self.users.insert(&candidate).await? {
            InsertOutcome::Inserted => {
                tracing::info!(
                    user_id = %candidate.id,
                    contact = %contact.masked(),
                    verified,
                    "user created"
                );
                Ok(Resolution::CreatedNew(candidate))
            }
            InsertOutcome::Duplicate => match self.find(contact, phone_match).await? {
                Some(user) => Ok(Resolution::Found(user)),
                None => {
                    tracing::error!(
                        contact = %contact.masked(),
                        "unique violation on user insert but no row on re-read"
                    );
                    Ok(Resolution::RetryExhausted)
                }
            },
        }
    }

    fn new_user(&self, contact: &Contact, name: Option<&str>, verified: bool) -> User {
        let id = self.ids.next_id();
        let now = self.clock.now();
        let (phone, email) = match contact {
            Contact::Phone(phone) => (phone.clone(), None),
            Contact::Email(email) => (placeholder_phone(id), Some(email.clone())),
        };
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_USER_NAME);
        User {
            id,
            phone,
            email,
            name: name.to_owned(),
            role: UserRole::User,
            passkey_hash: None,
            status: UserStatus::Active,
            is_verified: verified,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── ResolveOrCreateUser (internal) ───────────────────────────────────────────

pub struct ResolveOrCreateInput {
    pub identity_key: String,
    pub identity_type: ContactKind,
    pub name: Option<String>,
}

#[derive(Debug)]
pub struct ResolveOrCreateOutput {
    pub user: User,
    pub is_new: bool,
}

pub struct ResolveOrCreateUserUseCase<U: UserRepository> {
    pub resolver: IdentityResolver<U>,
}

impl<U: UserRepository> ResolveOrCreateUserUseCase<U> {
    /// Placeholder users created here stay unverified until their owner completes an
    /// OTP login.
    pub async fn execute(
        &self,
        input: ResolveOrCreateInput,
    ) -> Result<ResolveOrCreateOutput, AuthServiceError> {
        let contact = Contact::parse(input.identity_type, &input.identity_key)?;
        let name = normalize_name(input.name.as_deref())?;

        match self
            .resolver
            .resolve(&contact, PhoneMatch::AllowSuffix, name.as_deref(), false)
            .await?
        {
            Resolution::Found(user) => Ok(ResolveOrCreateOutput {
                user,
                is_new: false,
            }),
            Resolution::CreatedNew(user) => Ok(ResolveOrCreateOutput { user, is_new: true }),
            Resolution::RetryExhausted => Err(AuthServiceError::Internal(anyhow!(
                "could not resolve or create user for {}",
                contact.masked()
            ))),
        }
    }
}

/// Tell the identity service about a user who just logged in. Failures are logged only.
pub async fn notify_onboard<N: IdentityNotifier>(notifier: &N, user: &User) {
    let request = OnboardRequest {
        user_id: user.id,
        name: user.name.clone(),
        phone: user.real_phone().map(str::to_owned),
        email: user.email.clone(),
    };
    if let Err(e) = notifier.onboard(&request).await {
        tracing::warn!(user_id = %user.id, error = %e, "identity onboard hand-off failed");
    }
}
