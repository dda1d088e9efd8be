// self
use crate::{_prelude::*, auth::Identity, obs::OpKind};

/// Future returned by [`OpSpan::instrument`]; a plain passthrough without the `tracing` feature.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; a plain passthrough without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// `oauth2_account.op` span scoped to one operation and, when known, the identity it acts for.
///
/// Events emitted inside the span inherit the `identity` field, so call sites never repeat it.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a span for `kind` at the named call site.
	pub fn new(kind: OpKind, stage: &'static str, identity: Option<&Identity>) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_account.op",
				op = kind.as_str(),
				stage,
				identity = tracing::field::Empty,
			);

			if let Some(identity) = identity {
				span.record("identity", tracing::field::display(identity));
			}

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, identity);

			Self {}
		}
	}

	/// Runs `fut` inside the span. A leader spawned from a caller's span stays its child.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
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
