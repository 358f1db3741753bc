//! Engine context
//!
//! Bundles the collaborators every node and deployment needs: the management
//! hub environment, the command runner, the capability registry and the
//! engine configuration. The context also carries the tracing span that
//! events are attributed to; deployments and nodes derive child contexts
//! with their own span.

use std::sync::Arc;

use tracing::Span;

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::registry::CapabilityRegistry;
use crate::runner::CommandRunner;

#[derive(Clone)]
pub struct Context {
    pub environment: Arc<Environment>,
    pub runner: Arc<dyn CommandRunner>,
    pub registry: Arc<CapabilityRegistry>,
    pub config: EngineConfig,
    span: Span,
}

impl Context {
    pub fn new(
        environment: Arc<Environment>,
        runner: Arc<dyn CommandRunner>,
        registry: Arc<CapabilityRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            environment,
            runner,
            registry,
            config,
            span: Span::current(),
        }
    }

    /// Span that operations using this context are recorded under
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Child context for a deployment
    pub(crate) fn for_deployment(&self, name: &str) -> Self {
        let span = tracing::info_span!(parent: &self.span, "deployment", name = %name);
        Self {
            span,
            ..self.clone()
        }
    }

    /// Child context for a node
    pub(crate) fn for_node(&self, name: &str) -> Self {
        let span = tracing::info_span!(parent: &self.span, "node", name = %name);
        Self {
            span,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("environment", &self.environment)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
