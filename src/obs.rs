//! Optional observability helpers for token refreshes.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `xoauth2_broker.refresh` with the `user` and
//!   `stage` (call site) fields, plus debug/warn events for cache hits and exchange outcomes.
//! - Enable `metrics` to increment the `xoauth2_broker_refresh_total` counter for every
//!   outcome, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each `get_token`/`generate_token` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// Cached token was still valid; no exchange happened.
	CacheHit,
	/// Caller joined an exchange another caller had already started.
	Coalesced,
	/// Caller started a new exchange.
	Attempt,
	/// Exchange completed and the store was updated.
	Success,
	/// Exchange failed; the store was left untouched.
	Failure,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::CacheHit => "cache_hit",
			RefreshOutcome::Coalesced => "coalesced",
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
