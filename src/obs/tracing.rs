// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, credential::CredentialKey, obs::FlowKind};

/// Span wrapper used by credential flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
}
impl FlowSpan {
	/// Creates a span tagged with the flow kind, call site, and credential key.
	pub fn new(kind: FlowKind, stage: &'static str, key: &CredentialKey) -> Self {
		let span = tracing::info_span!(
			"credential_broker.flow",
			flow = kind.as_str(),
			stage,
			account = key.account.get(),
			feed = key.feed.get(),
		);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
