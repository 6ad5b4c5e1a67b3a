use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};

use crate::domain::errors::StoreError;
use crate::domain::ports::{KeyValueStore, Mutation, SetScan, Transaction};

// Guards are all checked before the first write, so a failed guard leaves
// the keyspace untouched. Redis runs the script atomically.
//
// Set operands are type-checked up front too: a WRONGTYPE error halfway
// through the apply loop would leave the earlier writes in place.
//
// ARGV holds (op, operand) pairs aligned with KEYS. Reply: {1, 0} on commit,
// {0, i} when KEYS[i] already exists, {-1, i} when KEYS[i] is missing,
// {-2, i} when KEYS[i] holds something other than a set.
const COMMIT_SCRIPT: &str = r#"
for i = 1, #KEYS do
  local op = ARGV[2 * i - 1]
  if op == 'sadd' or op == 'srem' then
    local t = redis.call('TYPE', KEYS[i]).ok
    if t ~= 'set' and t ~= 'none' then
      return {-2, i}
    end
  else
    local exists = redis.call('EXISTS', KEYS[i]) == 1
    if op == 'setnx' and exists then
      return {0, i}
    end
    if (op == 'setxx' or op == 'del') and not exists then
      return {-1, i}
    end
  end
end
for i = 1, #KEYS do
  local op = ARGV[2 * i - 1]
  local operand = ARGV[2 * i]
  if op == 'setnx' or op == 'setxx' then
    redis.call('SET', KEYS[i], operand)
  elseif op == 'del' then
    redis.call('DEL', KEYS[i])
  elseif op == 'sadd' then
    redis.call('SADD', KEYS[i], operand)
  elseif op == 'srem' then
    redis.call('SREM', KEYS[i], operand)
  end
end
return {1, 0}
"#;

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// [`KeyValueStore`] backed by a single multiplexed Redis connection.
///
/// The connection manager reconnects on its own and is cheap to clone, so one
/// `RedisStore` is shared by every request.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    commit_script: Script,
}

impl RedisStore {
    /// Opens the connection and checks it with `PING`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        log::info!("connected to redis at {}", url);

        Ok(Self {
            conn,
            commit_script: Script::new(COMMIT_SCRIPT),
        })
    }
}

fn encode(m: &Mutation) -> (&str, &str) {
    match m {
        Mutation::SetIfAbsent { value, .. } => ("setnx", value.as_str()),
        Mutation::SetIfPresent { value, .. } => ("setxx", value.as_str()),
        Mutation::Delete { .. } => ("del", ""),
        Mutation::AddToSet { member, .. } => ("sadd", member.as_str()),
        Mutation::RemoveFromSet { member, .. } => ("srem", member.as_str()),
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn scan_set(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<SetScan, StoreError> {
        let mut conn = self.conn.clone();
        let (cursor, members): (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(set)
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(SetScan { members, cursor })
    }

    async fn commit(&self, txn: Transaction) -> Result<(), StoreError> {
        if txn.is_empty() {
            return Ok(());
        }

        let mut invocation = self.commit_script.prepare_invoke();
        for m in txn.mutations() {
            let (op, operand) = encode(m);
            invocation.key(m.key()).arg(op).arg(operand);
        }

        let mut conn = self.conn.clone();
        let reply: Vec<i64> = invocation.invoke_async(&mut conn).await?;

        let key_at = |i: i64| {
            usize::try_from(i - 1)
                .ok()
                .and_then(|i| txn.mutations().get(i))
                .map(|m| m.key().to_string())
                .unwrap_or_default()
        };
        match reply.as_slice() {
            [1, _] => Ok(()),
            [0, i] => Err(StoreError::KeyExists(key_at(*i))),
            [-1, i] => Err(StoreError::KeyNotFound(key_at(*i))),
            [-2, i] => Err(StoreError::Transaction(format!(
                "{} does not hold a set",
                key_at(*i)
            ))),
            other => Err(StoreError::Transaction(format!(
                "unexpected commit reply {other:?}"
            ))),
        }
    }
}
