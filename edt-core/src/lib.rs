//! EDT LOGOS Core Library
//!
//! Aggregates per-program ADE calendar feeds into one filtered calendar and
//! overlays user-declared constant events on top of it.

pub mod aggregate;
pub mod compose;
pub mod config;
pub mod constant;
pub mod error;
pub mod extract;
pub mod feed;
pub mod filter;
pub mod ics;
pub mod timezone;
pub mod types;
pub mod window;

// Re-export core types and error handling
pub use error::{Error, Result};
pub use types::*;

/// Commonly used items
pub mod prelude {
    pub use crate::{
        aggregate::*, compose::*, config::*, constant::*, extract::*, feed::*, filter::*,
        ics::*, timezone::*, types::*, window::*,
    };
}
