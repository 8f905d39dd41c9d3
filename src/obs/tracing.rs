// self
use crate::{_prelude::*, obs::RefreshOutcome};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRefresh<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRefresh<F> = F;

/// A span builder used by the token generator.
#[derive(Clone, Debug)]
pub struct RefreshSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RefreshSpan {
	/// Creates a new span tagged with the user and stage.
	pub fn new(user: &str, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("xoauth2_broker.refresh", user, stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (user, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRefresh<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a refresh outcome inside the current span (when tracing is enabled).
pub fn trace_refresh_outcome(outcome: RefreshOutcome, error: Option<&Error>) {
	#[cfg(feature = "tracing")]
	{
		match (outcome, error) {
			(RefreshOutcome::Failure, Some(err)) =>
				tracing::warn!(outcome = outcome.as_str(), error = %err, "token refresh failed"),
			_ => tracing::debug!(outcome = outcome.as_str(), "token refresh"),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (outcome, error);
	}
}
