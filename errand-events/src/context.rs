//! Request-scoped publishing context.

use errand_dispatch::Scope;
use std::time::Duration;
use tracing::Span;
use uuid::Uuid;

/// What a publisher knows about the request it is serving.
///
/// Carries the caller's cancellation scope, its correlation id, and the span
/// that log lines about this request should attach to.
#[derive(Debug, Clone)]
pub struct RequestContext {
    scope: Scope,
    trace_id: String,
    span: Span,
}

impl RequestContext {
    /// Fresh context: live root scope, random trace id, current span.
    pub fn new() -> Self {
        Self {
            scope: Scope::new(),
            trace_id: Uuid::new_v4().to_string(),
            span: Span::current(),
        }
    }

    /// Use the trace id of the inbound request.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Tie this context to an existing scope, e.g. the request's own.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Child context that also expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            scope: self.scope.with_timeout(timeout),
            trace_id: self.trace_id.clone(),
            span: self.span.clone(),
        }
    }

    /// Context that keeps the trace id and span but not the cancellation:
    /// a fresh root scope bounded only by `timeout`.
    pub fn detached(&self, timeout: Duration) -> Self {
        Self {
            scope: Scope::new().with_timeout(timeout),
            trace_id: self.trace_id.clone(),
            span: self.span.clone(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Whether the caller has been cancelled or timed out.
    pub fn is_done(&self) -> bool {
        self.scope.is_done()
    }

    pub fn cancel(&self) {
        self.scope.cancel();
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_trace_id() {
        let ctx = RequestContext::new();

        assert!(Uuid::parse_str(ctx.trace_id()).is_ok());
        assert!(!ctx.is_done());
    }

    #[test]
    fn test_with_trace_id() {
        let ctx = RequestContext::new().with_trace_id("req-42");
        assert_eq!(ctx.trace_id(), "req-42");
    }

    #[tokio::test]
    async fn test_child_follows_parent_cancel() {
        let ctx = RequestContext::new();
        let child = ctx.with_timeout(Duration::from_secs(60));

        ctx.cancel();

        assert!(child.is_done());
        assert_eq!(child.trace_id(), ctx.trace_id());
    }

    #[tokio::test]
    async fn test_detached_ignores_parent_cancel() {
        let ctx = RequestContext::new().with_trace_id("req-7");
        ctx.cancel();

        let detached = ctx.detached(Duration::from_secs(1));

        assert!(!detached.is_done());
        assert_eq!(detached.trace_id(), "req-7");
        assert!(detached.scope().deadline().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_expires() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(ctx.is_done());
    }
}
