//! SmartTargetFinder (C9): five-strategy window resolution, an
//! out-of-context win-event hook, adaptive polling, and bounded
//! auto-recovery.

pub mod error;
pub mod finder;
pub mod hook;
pub mod polling;
pub mod strategies;

pub use error::{FinderError, Result};
pub use finder::SmartTargetFinder;
pub use polling::{AdaptivePoller, PollingConfig, RecoveryConfig, RecoveryState};
pub use strategies::{FinderQuery, StrategyName, resolve, tokenize_title};
