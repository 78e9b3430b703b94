//! Per-player weapon sessions

mod actor;
pub mod protocol;
mod registry;

pub use actor::{SessionError, SessionHandle, SessionSettings, WeaponSession};
pub use protocol::WeaponNotice;
pub use registry::SessionRegistry;
