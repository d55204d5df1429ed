//! Redis backend for the scripto script registry.
//!
//! Provides [`RedisEngine`], a [`ScriptEngine`](scripto_core::ScriptEngine)
//! over a multiplexed Redis connection, and [`RedisSupervisor`], which owns
//! the connection lifecycle (connect, health check, retry)
//! and raises the `Connected` / `ConnectionError` signals the registry
//! reacts to.

pub mod engine;
pub mod supervisor;

pub use engine::RedisEngine;
pub use supervisor::{ConnectionConfig, RedisSupervisor, SupervisorError};
