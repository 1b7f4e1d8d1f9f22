use anyhow::{Context as _, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use tollgate_auth_schema::{audit_logs, otp_codes, refresh_tokens, users};
use tollgate_domain::user::{UserRole, UserStatus};

use crate::domain::repository::{
    AuditLogRepository, OtpRepository, RefreshTokenRepository, UserRepository,
};
use crate::domain::types::{
    AuditEntry, InsertOutcome, OtpCode, ProfileChanges, RefreshTokenRecord, UpdateOutcome, User,
};
use crate::error::AuthServiceError;

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

// ── User repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthServiceError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user by id")?;
        model.map(user_from_model).transpose()
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AuthServiceError> {
        let model = users::Entity::find()
            .filter(users::Column::Phone.eq(phone))
            .one(&self.db)
            .await
            .context("find user by phone")?;
        model.map(user_from_model).transpose()
    }

    async fn find_by_phone_suffix(
        &self,
        suffix: &str,
    ) -> Result<Option<User>, AuthServiceError> {
        let model = users::Entity::find()
            .filter(users::Column::Phone.ends_with(suffix))
            .order_by_asc(users::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find user by phone suffix")?;
        model.map(user_from_model).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthServiceError> {
        let model = users::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(users::Column::Email)))
                    .eq(email.to_lowercase()),
            )
            .one(&self.db)
            .await
            .context("find user by email")?;
        model.map(user_from_model).transpose()
    }

    async fn insert(&self, user: &User) -> Result<InsertOutcome, AuthServiceError> {
        let result = users::ActiveModel {
            id: Set(user.id),
            phone: Set(user.phone.clone()),
            email: Set(user.email.clone()),
            name: Set(user.name.clone()),
            role: Set(i16::from(user.role.as_u8())),
            passkey_hash: Set(user.passkey_hash.clone()),
            status: Set(i16::from(user.status.as_u8())),
            is_verified: Set(user.is_verified),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
        }
        .insert(&self.db)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn mark_verified(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), AuthServiceError> {
        users::Entity::update_many()
            .col_expr(users::Column::IsVerified, Expr::value(true))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::IsVerified.eq(false))
            .exec(&self.db)
            .await
            .context("mark user verified")?;
        Ok(())
    }

    async fn set_passkey_hash(
        &self,
        id: Uuid,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthServiceError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::PasskeyHash, Expr::value(hash))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("set passkey hash")?;
        Ok(result.rows_affected > 0)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, AuthServiceError> {
        let mut update = users::Entity::update_many()
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id));
        if let Some(name) = &changes.name {
            update = update.col_expr(users::Column::Name, Expr::value(name.clone()));
        }
        if let Some(email) = &changes.email {
            update = update.col_expr(users::Column::Email, Expr::value(email.clone()));
        }

        match update.exec(&self.db).await {
            Ok(result) if result.rows_affected == 0 => return Ok(UpdateOutcome::NotFound),
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(UpdateOutcome::EmailTaken),
            Err(e) => return Err(anyhow::Error::new(e).context("update profile").into()),
        }

        Ok(match self.find_by_id(id).await? {
            Some(user) => UpdateOutcome::Updated(user),
            None => UpdateOutcome::NotFound,
        })
    }
}

fn user_from_model(model: users::Model) -> Result<User, AuthServiceError> {
    let role = u8::try_from(model.role)
        .ok()
        .and_then(UserRole::from_u8)
        .ok_or_else(|| anyhow!("user {} has unknown role {}", model.id, model.role))?;
    let status = u8::try_from(model.status)
        .ok()
        .and_then(UserStatus::from_u8)
        .ok_or_else(|| anyhow!("user {} has unknown status {}", model.id, model.status))?;
    Ok(User {
        id: model.id,
        phone: model.phone,
        email: model.email,
        name: model.name,
        role,
        passkey_hash: model.passkey_hash,
        status,
        is_verified: model.is_verified,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── OTP repository ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOtpRepository {
    pub db: DatabaseConnection,
}

impl OtpRepository for DbOtpRepository {
    async fn create(&self, otp: &OtpCode) -> Result<(), AuthServiceError> {
        otp_codes::ActiveModel {
            id: Set(otp.id),
            identifier: Set(otp.identifier.clone()),
            code: Set(otp.code.clone()),
            expires_at: Set(otp.expires_at),
            used: Set(otp.used),
            created_at: Set(otp.created_at),
        }
        .insert(&self.db)
        .await
        .context("create otp")?;
        Ok(())
    }

    async fn find_valid(
        &self,
        identifier: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpCode>, AuthServiceError> {
        let model = otp_codes::Entity::find()
            .filter(otp_codes::Column::Identifier.eq(identifier))
            .filter(otp_codes::Column::Code.eq(code))
            .filter(otp_codes::Column::Used.eq(false))
            .filter(otp_codes::Column::ExpiresAt.gt(now))
            .order_by_desc(otp_codes::Column::CreatedAt)
            .order_by_desc(otp_codes::Column::Id)
            .one(&self.db)
            .await
            .context("find valid otp")?;
        Ok(model.map(otp_from_model))
    }

    async fn consume(&self, otp: &OtpCode) -> Result<bool, AuthServiceError> {
        let id = otp.id;
        let identifier = otp.identifier.clone();
        let consumed = self
            .db
            .transaction::<_, bool, DbErr>(move |txn| {
                Box::pin(async move {
                    let locked: Vec<Uuid> = lock_unused_otps(&identifier)
                        .select_only()
                        .column(otp_codes::Column::Id)
                        .into_tuple()
                        .all(txn)
                        .await?;
                    if !locked.contains(&id) {
                        return Ok(false);
                    }
                    otp_codes::Entity::update_many()
                        .col_expr(otp_codes::Column::Used, Expr::value(true))
                        .filter(otp_codes::Column::Id.is_in(locked))
                        .exec(txn)
                        .await?;
                    Ok(true)
                })
            })
            .await
            .context("consume otp")?;
        Ok(consumed)
    }

    async fn delete_expired_or_used(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError> {
        let result = otp_codes::Entity::delete_many()
            .filter(
                Condition::any()
                    .add(otp_codes::Column::ExpiresAt.lte(now))
                    .add(otp_codes::Column::Used.eq(true)),
            )
            .exec(&self.db)
            .await
            .context("delete expired or used otps")?;
        Ok(result.rows_affected)
    }
}

/// Locks every unused code of an identifier in id order. Concurrent consumers of different
/// codes for the same identifier queue on the first row instead of deadlocking.
fn lock_unused_otps(identifier: &str) -> Select<otp_codes::Entity> {
    otp_codes::Entity::find()
        .filter(otp_codes::Column::Identifier.eq(identifier))
        .filter(otp_codes::Column::Used.eq(false))
        .order_by_asc(otp_codes::Column::Id)
        .lock_exclusive()
}

fn otp_from_model(model: otp_codes::Model) -> OtpCode {
    OtpCode {
        id: model.id,
        identifier: model.identifier,
        code: model.code,
        expires_at: model.expires_at,
        used: model.used,
        created_at: model.created_at,
    }
}

// ── Refresh token repository ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRefreshTokenRepository {
    pub db: DatabaseConnection,
}

impl RefreshTokenRepository for DbRefreshTokenRepository {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AuthServiceError> {
        insert_refresh_token(&self.db, record)
            .await
            .context("create refresh token")?;
        Ok(())
    }

    async fn find_with_user(
        &self,
        token: &str,
    ) -> Result<Option<(RefreshTokenRecord, User)>, AuthServiceError> {
        let found = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::Token.eq(token))
            .find_also_related(users::Entity)
            .one(&self.db)
            .await
            .context("find refresh token with user")?;
        match found {
            Some((token, Some(user))) => Ok(Some((
                refresh_token_from_model(token),
                user_from_model(user)?,
            ))),
            _ => Ok(None),
        }
    }

    async fn rotate(
        &self,
        old_token: &str,
        next: &RefreshTokenRecord,
    ) -> Result<bool, AuthServiceError> {
        let old_token = old_token.to_owned();
        let next = next.clone();
        let rotated = self
            .db
            .transaction::<_, bool, DbErr>(move |txn| {
                Box::pin(async move {
                    let locked: Vec<String> = lock_user_tokens(next.user_id)
                        .select_only()
                        .column(refresh_tokens::Column::Token)
                        .into_tuple()
                        .all(txn)
                        .await?;
                    if !locked.contains(&old_token) {
                        return Ok(false);
                    }
                    refresh_tokens::Entity::delete_many()
                        .filter(refresh_tokens::Column::UserId.eq(next.user_id))
                        .exec(txn)
                        .await?;
                    insert_refresh_token(txn, &next).await?;
                    Ok(true)
                })
            })
            .await
            .context("rotate refresh token")?;
        Ok(rotated)
    }

    async fn delete_one(&self, user_id: Uuid, token: &str) -> Result<u64, AuthServiceError> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .filter(refresh_tokens::Column::Token.eq(token))
            .exec(&self.db)
            .await
            .context("delete refresh token")?;
        Ok(result.rows_affected)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthServiceError> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .context("delete refresh tokens for user")?;
        Ok(result.rows_affected)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthServiceError> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await
            .context("delete expired refresh tokens")?;
        Ok(result.rows_affected)
    }
}

/// Locks all of a user's refresh tokens in id order before a rotation rewrites them.
fn lock_user_tokens(user_id: Uuid) -> Select<refresh_tokens::Entity> {
    refresh_tokens::Entity::find()
        .filter(refresh_tokens::Column::UserId.eq(user_id))
        .order_by_asc(refresh_tokens::Column::Id)
        .lock_exclusive()
}

async fn insert_refresh_token<C: ConnectionTrait>(
    conn: &C,
    record: &RefreshTokenRecord,
) -> Result<(), DbErr> {
    refresh_tokens::ActiveModel {
        id: Set(record.id),
        token: Set(record.token.clone()),
        user_id: Set(record.user_id),
        expires_at: Set(record.expires_at),
        created_at: Set(record.created_at),
    }
    .insert(conn)
    .await?;
    Ok(())
}

fn refresh_token_from_model(model: refresh_tokens::Model) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: model.id,
        token: model.token,
        user_id: model.user_id,
        expires_at: model.expires_at,
        created_at: model.created_at,
    }
}

// ── Audit log repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAuditLogRepository {
    pub db: DatabaseConnection,
}

impl AuditLogRepository for DbAuditLogRepository {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuthServiceError> {
        audit_logs::ActiveModel {
            id: Set(entry.id),
            user_id: Set(entry.user_id),
            action: Set(entry.action.as_str().to_owned()),
            identifier: Set(entry.identifier.clone()),
            ip_address: Set(entry.ip_address.clone()),
            user_agent: Set(entry.user_agent.clone()),
            metadata: Set(entry.metadata.clone()),
            success: Set(entry.success),
            created_at: Set(entry.created_at),
        }
        .insert(&self.db)
        .await
        .context("append audit log")?;
        Ok(())
    }
}
