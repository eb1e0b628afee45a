//! Keyword engagement signals: the state machine, the live candy updater,
//! keyword add/remove lifecycle and the scheduled insight regeneration.

pub mod lifecycle;
pub mod regen;
pub mod state;
pub mod updater;

use crate::keylock::KeyedLocks;
use crate::model::UserId;

pub use lifecycle::{KeywordLifecycle, LifecycleChange};
pub use regen::{KeywordInsightRegenerator, SweepReport};
pub use state::{SignalState, SignalStatus, WaterDrop};
pub use updater::SignalUpdater;

/// One lock per `(user, keyword key)`, shared by everything that writes a
/// signal record.
pub type SignalLocks = KeyedLocks<(UserId, String)>;
