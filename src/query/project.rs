//! Effective-project resolution.
//!
//! Under JWT authentication the default project comes straight from
//! configuration. Under GCE authentication it is discovered from the
//! provider on first use through a sentinel query and cached for the
//! lifetime of the engine; concurrent first callers await the same
//! discovery instead of issuing duplicates.

use super::{DefaultProjectLookupPayload, QueryEngine, DEFAULT_PROJECT_LOOKUP};
use crate::{config::AuthType, error::Result, provider::RequestBatch};
use tracing::info;

impl QueryEngine {
    /// The project used when a query does not name one. Empty until GCE
    /// discovery has completed (or when no project is configured).
    pub fn default_project(&self) -> String {
        match self.config.auth_type {
            AuthType::Gce => self.gce_default_project.get().cloned().unwrap_or_default(),
            AuthType::Jwt => self.config.default_project.clone().unwrap_or_default(),
        }
    }

    /// Must be awaited before any dispatch; queries sent with an
    /// unresolved project get rejected provider-side. A discovery
    /// failure propagates and leaves the cache empty for the next
    /// attempt.
    pub async fn ensure_default_project(&self) -> Result<()> {
        if self.config.auth_type != AuthType::Gce {
            return Ok(());
        }

        self.gce_default_project
            .get_or_try_init(|| self.discover_default_project())
            .await?;
        Ok(())
    }

    async fn discover_default_project(&self) -> Result<String> {
        let batch = RequestBatch {
            from: None,
            to: None,
            queries: vec![DefaultProjectLookupPayload {
                ref_id: DEFAULT_PROJECT_LOOKUP.to_string(),
                kind: DEFAULT_PROJECT_LOOKUP,
            }],
        };

        let response = self.provider().post_batch(&batch).await?;
        let project = response
            .results
            .get(DEFAULT_PROJECT_LOOKUP)
            .and_then(|result| result.meta.as_ref())
            .and_then(|meta| meta.get("defaultProject"))
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        info!(project = %project, "discovered GCE default project");
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_engine;
    use crate::config::AuthType;

    #[test]
    fn jwt_mode_uses_configured_project() {
        let engine = test_engine(AuthType::Jwt);
        assert_eq!(engine.default_project(), "config-project");
    }

    #[test]
    fn gce_mode_is_empty_before_discovery() {
        let engine = test_engine(AuthType::Gce);
        assert_eq!(engine.default_project(), "");
    }

    #[tokio::test]
    async fn jwt_mode_skips_discovery() {
        // The provider URL is unroutable; reaching it would fail loudly.
        let engine = test_engine(AuthType::Jwt);
        engine.ensure_default_project().await.unwrap();
        assert_eq!(engine.default_project(), "config-project");
    }
}
