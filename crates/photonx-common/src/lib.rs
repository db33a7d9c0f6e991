//! PhotonX Common Types
//!
//! Shared types used across the PhotonX coordinator: identifiers and
//! addresses, 256-bit token amounts, the channel record and its status
//! machine, the error taxonomy, and time utilities.

pub mod amount;
pub mod channel;
pub mod error;
pub mod identifiers;
pub mod time;

pub use amount::*;
pub use channel::*;
pub use error::*;
pub use identifiers::*;
pub use time::*;
