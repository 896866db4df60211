//! Core types and utilities for Haven.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Identifiers**: `UserId` and record key generation
//! - **Callers**: the authenticated `(user, role)` pair handed to services
//! - **Time**: millisecond-precision ISO-8601 timestamps used on every item
//! - **Error types**: common error definitions
//!
//! # Example
//!
//! ```
//! use haven_core::{Caller, Role, UserId};
//!
//! let user_id: UserId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
//! let caller = Caller::new(user_id, Role::Admin);
//! assert!(caller.is_admin());
//!
//! let key = haven_core::new_key();
//! assert_eq!(key.len(), 36);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod caller;
pub mod error;
pub mod ids;
pub mod time;

pub use caller::{Caller, Role};
pub use error::{CoreError, Result};
pub use ids::{new_key, IdError, UserId};
