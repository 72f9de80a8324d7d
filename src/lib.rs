//! Async host for the `canvas` engine.
//!
//! | Module     | Role                                                      |
//! |------------|-----------------------------------------------------------|
//! | `adapters` | Durable store and ephemeral channel traits, in-memory impls |
//! | `services` | Typed preview/cursor channels and lock write execution     |
//! | `session`  | One actor on one canvas: event queue, spawned writes, notices |
//! | `config`   | `SessionConfig::from_env`                                  |
//! | `error`    | `SessionError`, collaborator errors, `ErrorCode`, `Notice`  |

pub mod adapters;
pub mod config;
pub mod error;
pub mod services;
pub mod session;
