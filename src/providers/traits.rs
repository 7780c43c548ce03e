use crate::config::ModelConfig;
use crate::error::InvocationError;
use async_trait::async_trait;

/// Seam to the external text-generation provider.
///
/// One call is one outbound request: no retries, no streaming. Every failure
/// mode is mapped to an [`InvocationError`] cause tag before it crosses this
/// boundary.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider tag used in errors and logs.
    fn name(&self) -> &str;

    /// Send one system+user exchange, return the generated text.
    async fn chat(
        &self,
        system: &str,
        user: &str,
        params: &ModelConfig,
    ) -> Result<String, InvocationError>;
}
