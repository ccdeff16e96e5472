//! Client-side session engine for Sames.
//!
//! Holds the parts of the client with real invariants: compatibility scoring,
//! the swipe deck, conversation threads, and the session/token lifecycle.
//! This crate performs no HTTP itself; network access goes through the
//! traits in [`gateway`], and persistence through [`storage`].

pub mod deck;
pub mod error;
pub mod gateway;
pub mod profile;
pub mod score;
pub mod session;
pub mod storage;
pub mod thread;

pub use error::{AuthError, Error, Result, ValidationError};
