//! Reply generator abstraction
//!
//! Both reply sources (the Gemini backend and the canned-response table)
//! implement [`ReplyGenerator`]. Generators never fail: every error is
//! degraded to a fallback string inside the implementation.

use std::sync::Arc;

use async_trait::async_trait;

/// Produces reply text for an inbound message
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate the reply for `text`
    async fn generate(&self, text: &str) -> String;

    /// Short identifier used in logs ("gemini", "canned", ...)
    fn name(&self) -> &'static str;
}

/// Shared, type-erased generator
pub type SharedGenerator = Arc<dyn ReplyGenerator>;

#[async_trait]
impl<T: ReplyGenerator + ?Sized> ReplyGenerator for Arc<T> {
    async fn generate(&self, text: &str) -> String {
        (**self).generate(text).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
