//! Ephemeral storage: the generic [`ExpiringMap`] and the [`StateStore`]
//! built on it.

pub mod expiring;
pub mod state;

pub use expiring::{ExpiringMap, ExpiringSet};
pub use state::{DEFAULT_STATE_TTL, MakeOptions, StateEntry, StatePacket, StateStore, StateValue};
