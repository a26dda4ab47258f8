//! Batch Executor
//!
//! Queues store commands and executes them strictly in enqueue order.

use super::store::Store;
use crate::error::Result;

/// Closed set of store commands a batch can carry
#[derive(Debug, Clone)]
pub enum StoreCommand {
    /// Get value by key
    Get { key: String },

    /// Set key-value with optional TTL (seconds)
    Set {
        key: String,
        value: String,
        ttl: Option<u64>,
    },

    /// Set key-value with mandatory TTL (seconds)
    SetEx {
        key: String,
        ttl: u64,
        value: String,
    },

    /// Increment by 1
    Incr { key: String },

    /// Increment by delta
    IncrBy { key: String, delta: i64 },

    /// Set or refresh expiry
    Expire { key: String, seconds: u64 },

    /// Remaining time-to-live
    Ttl { key: String },

    /// Delete keys
    Del { keys: Vec<String> },

    /// Count live keys
    Exists { keys: Vec<String> },

    /// Get multiple keys at once
    MGet { keys: Vec<String> },
}

/// Result of a single executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Simple acknowledgement
    Ok,

    /// Key not found
    Nil,

    /// String value
    Value(String),

    /// Integer value
    Integer(i64),

    /// Array response, aligned to a multi-key request
    Array(Vec<Option<String>>),
}

impl Store {
    /// Start a new command batch
    pub fn multi(&self) -> Multi {
        Multi {
            store: self.clone(),
            queued: Vec::new(),
        }
    }

    /// Execute a single command. This is the only dispatch point, so the
    /// supported surface is exhaustively matched.
    pub fn apply(&self, command: &StoreCommand) -> Result<Reply> {
        match command {
            StoreCommand::Get { key } => Ok(match self.get(key) {
                Some(value) => Reply::Value(value),
                None => Reply::Nil,
            }),
            StoreCommand::Set { key, value, ttl } => {
                self.set(key, value.clone(), *ttl);
                Ok(Reply::Ok)
            }
            StoreCommand::SetEx { key, ttl, value } => {
                self.setex(key, *ttl, value.clone());
                Ok(Reply::Ok)
            }
            StoreCommand::Incr { key } => self.incr(key).map(Reply::Integer),
            StoreCommand::IncrBy { key, delta } => self.incr_by(key, *delta).map(Reply::Integer),
            StoreCommand::Expire { key, seconds } => Ok(Reply::Integer(self.expire(key, *seconds))),
            StoreCommand::Ttl { key } => Ok(Reply::Integer(self.ttl(key))),
            StoreCommand::Del { keys } => Ok(Reply::Integer(self.del(keys) as i64)),
            StoreCommand::Exists { keys } => Ok(Reply::Integer(self.exists(keys) as i64)),
            StoreCommand::MGet { keys } => Ok(Reply::Array(self.mget(keys))),
        }
    }
}

/// Command batch builder returned by [`Store::multi`]
///
/// Commands are recorded, not executed, until [`Multi::exec`] runs them
/// in enqueue order. The batch guarantees ordering, not isolation: other
/// callers may touch the store between construction and execution.
#[derive(Debug)]
pub struct Multi {
    store: Store,
    queued: Vec<StoreCommand>,
}

impl Multi {
    /// Queue a GET
    pub fn get(mut self, key: impl Into<String>) -> Self {
        self.queued.push(StoreCommand::Get { key: key.into() });
        self
    }

    /// Queue a SET with optional TTL
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>, ttl: Option<u64>) -> Self {
        self.queued.push(StoreCommand::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        });
        self
    }

    /// Queue a SETEX
    pub fn setex(mut self, key: impl Into<String>, ttl: u64, value: impl Into<String>) -> Self {
        self.queued.push(StoreCommand::SetEx {
            key: key.into(),
            ttl,
            value: value.into(),
        });
        self
    }

    /// Queue an INCR
    pub fn incr(mut self, key: impl Into<String>) -> Self {
        self.queued.push(StoreCommand::Incr { key: key.into() });
        self
    }

    /// Queue an INCRBY
    pub fn incr_by(mut self, key: impl Into<String>, delta: i64) -> Self {
        self.queued.push(StoreCommand::IncrBy {
            key: key.into(),
            delta,
        });
        self
    }

    /// Queue an EXPIRE
    pub fn expire(mut self, key: impl Into<String>, seconds: u64) -> Self {
        self.queued.push(StoreCommand::Expire {
            key: key.into(),
            seconds,
        });
        self
    }

    /// Queue a TTL probe
    pub fn ttl(mut self, key: impl Into<String>) -> Self {
        self.queued.push(StoreCommand::Ttl { key: key.into() });
        self
    }

    /// Queue a DEL
    pub fn del(mut self, keys: Vec<String>) -> Self {
        self.queued.push(StoreCommand::Del { keys });
        self
    }

    /// Queue an EXISTS
    pub fn exists(mut self, keys: Vec<String>) -> Self {
        self.queued.push(StoreCommand::Exists { keys });
        self
    }

    /// Queue an MGET
    pub fn mget(mut self, keys: Vec<String>) -> Self {
        self.queued.push(StoreCommand::MGet { keys });
        self
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Check if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Run every queued command in order, returning per-command results
    pub fn exec(self) -> Vec<Result<Reply>> {
        self.queued
            .iter()
            .map(|command| self.store.apply(command))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_batch_ordering() {
        let store = Store::new();

        let replies = store.multi().incr("counter").incr("counter").exec();
        let values: Vec<_> = replies.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![Reply::Integer(1), Reply::Integer(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_window_batch() {
        let store = Store::new();

        let replies = store
            .multi()
            .incr("rate:10.0.0.1:minute")
            .expire("rate:10.0.0.1:minute", 60)
            .ttl("rate:10.0.0.1:minute")
            .exec();

        let values: Vec<_> = replies.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            values,
            vec![Reply::Integer(1), Reply::Integer(1), Reply::Integer(60)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_command_errors_do_not_abort_batch() {
        let store = Store::new();
        store.set("word", "hello", None);

        let replies = store.multi().incr("word").get("word").exec();
        assert!(replies[0].is_err());
        assert_eq!(replies[1].as_ref().unwrap(), &Reply::Value("hello".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_batch() {
        let store = Store::new();

        let replies = store
            .multi()
            .set("a", "1", None)
            .setex("b", 30, "2")
            .mget(vec!["a".to_string(), "b".to_string(), "c".to_string()])
            .del(vec!["a".to_string()])
            .exists(vec!["a".to_string(), "b".to_string()])
            .exec();

        let values: Vec<_> = replies.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            values,
            vec![
                Reply::Ok,
                Reply::Ok,
                Reply::Array(vec![
                    Some("1".to_string()),
                    Some("2".to_string()),
                    None
                ]),
                Reply::Integer(1),
                Reply::Integer(1),
            ]
        );
    }
}
