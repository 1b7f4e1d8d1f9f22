use anyhow::Context as _;
use deadpool_redis::Pool;
use deadpool_redis::redis;

use crate::domain::repository::BucketStore;
use crate::domain::types::{BucketPolicy, Consumption};
use crate::error::AuthServiceError;

/// Refill-then-consume in one round trip, step for step the same as
/// `TokenBucket::try_consume`. The level is an integer (one token = period_ms units), so
/// every stored value round-trips through `tostring` exactly.
///
/// KEYS[1] bucket hash {level, ts}
/// ARGV full_level, refill_tokens, period_ms, now_ms, ttl_ms
/// Returns {1, remaining} or {0, retry_after_ms}.
const CONSUME_LUA: &str = r#"
local full = tonumber(ARGV[1])
local refill = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now_ms = tonumber(ARGV[4])
local ttl_ms = tonumber(ARGV[5])

local state = redis.call('HMGET', KEYS[1], 'level', 'ts')
local level = tonumber(state[1])
local ts = tonumber(state[2])
if level == nil or ts == nil then
  level = full
  ts = now_ms
end

local elapsed = math.max(0, now_ms - ts)
level = math.min(full, level + elapsed * refill)
ts = math.max(ts, now_ms)

local allowed = 0
local value
if level >= cost then
  level = level - cost
  allowed = 1
  value = math.floor(level / cost)
else
  value = math.ceil((cost - level) / refill)
end

redis.call('HSET', KEYS[1], 'level', string.format('%d', level), 'ts', string.format('%d', ts))
redis.call('PEXPIRE', KEYS[1], ttl_ms)
return {allowed, value}
"#;

#[derive(Clone)]
pub struct RedisBucketStore {
    pub pool: Pool,
}

impl BucketStore for RedisBucketStore {
    async fn try_consume(
        &self,
        key: &str,
        policy: &BucketPolicy,
        now_ms: i64,
    ) -> Result<Consumption, AuthServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthServiceError::Internal(e.into()))?;
        let (allowed, value): (i64, i64) = redis::cmd("EVAL")
            .arg(CONSUME_LUA)
            .arg(1)
            .arg(key)
            .arg(policy.full_level())
            .arg(policy.refill_tokens.max(1))
            .arg(policy.period_ms().max(1))
            .arg(now_ms)
            .arg(policy.full_refill_ms())
            .query_async(&mut conn)
            .await
            .context("run token bucket script")?;

        let value = u64::try_from(value).unwrap_or(0);
        Ok(if allowed == 1 {
            Consumption::Allowed {
                remaining: u32::try_from(value).unwrap_or(u32::MAX),
            }
        } else {
            Consumption::Denied {
                retry_after_ms: value,
            }
        })
    }

    async fn reset(
        &self,
        key: &str,
        policy: &BucketPolicy,
        now_ms: i64,
    ) -> Result<(), AuthServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AuthServiceError::Internal(e.into()))?;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("HSET")
            .arg(key)
            .arg("level")
            .arg(policy.full_level())
            .arg("ts")
            .arg(now_ms)
            .ignore()
            .cmd("PEXPIRE")
            .arg(key)
            .arg(policy.full_refill_ms())
            .ignore();
        let (): () = pipe
            .query_async(&mut conn)
            .await
            .context("reset token bucket")?;
        Ok(())
    }
}

/// `PING` through the pool, for readiness probes.
pub async fn ping(pool: &Pool) -> Result<(), AuthServiceError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AuthServiceError::Internal(e.into()))?;
    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .context("redis ping")?;
    Ok(())
}
