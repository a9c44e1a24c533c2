//! Parley: a small multi-user messaging service.
//!
//! Users sign up and sign in with email and password, keep a profile and a
//! contact list, and exchange messages in direct or group conversations.
//! Clients poll for new messages; there is no push channel.

pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
