//! PhotonX Protocol Messages
//!
//! Wire types exchanged between participants and the coordinator:
//! the RFQ message variants, the dual-signed channel state record, and
//! checkpoint/settlement payloads. Canonical encoding: integers as
//! unsigned decimal strings, addresses and hashes as lowercase `0x` hex.

pub mod codec;
pub mod messages;
pub mod state;

pub use messages::*;
pub use state::*;
