//! Deployments
//!
//! A [`Deployment`] is a named collection of nodes plus deployment-level
//! features, driven through a fixed build pipeline:
//!
//! 1. `update_environment`: features contribute environment overrides
//! 2. `pre_configure`: deployment features prepare
//! 3. `build_nodes`: nodes are built one after another, in list order
//! 4. `post_configure`: deployment features verify and finish
//!
//! The first failing step aborts the pipeline and leaves the status at the
//! step that failed. Once destroyed a deployment refuses further pipeline
//! calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use monster_core::domain::command::Connection;
use monster_core::domain::status::Status;
use monster_core::dto::DeploymentSummary;
use serde_json::{Map, Value};
use tracing::{Instrument, debug, error, info, warn};

use crate::context::Context;
use crate::error::{OrchestratorError, Result};
use crate::feature::{ArchivePlan, DeploymentFeature};
use crate::node::{self, Node, NodeParams};
use crate::provisioner::Provisioner;

/// What a deployment runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentParams {
    pub os: String,
    pub branch: String,
    pub product: String,
}

/// Endpoints of external services reachable from the deployment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clients {
    endpoints: BTreeMap<String, String>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, service: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints.insert(service.into(), url.into());
        self
    }

    pub fn endpoint(&self, service: &str) -> Option<&str> {
        self.endpoints.get(service).map(String::as_str)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }
}

/// View of a deployment handed to deployment feature hooks
pub struct DeploymentScope<'a> {
    pub name: &'a str,
    pub os: &'a str,
    pub branch: &'a str,
    pub product: &'a str,
    /// Environment overrides accumulated so far
    pub overrides: &'a mut Map<String, Value>,
    pub nodes: &'a [Node],
}

impl<'a> DeploymentScope<'a> {
    /// Nodes carrying a feature tag (case-insensitive), in list order
    pub fn search_role(&self, feature: &str) -> impl Iterator<Item = &'a Node> + use<'a> {
        node::with_feature(self.nodes, feature)
    }
}

/// A named collection of nodes built as one unit
pub struct Deployment {
    name: String,
    params: DeploymentParams,
    status: Status,
    provisioner: Arc<dyn Provisioner>,
    features: Vec<Box<dyn DeploymentFeature>>,
    nodes: Vec<Node>,
    overrides: Map<String, Value>,
    clients: Option<Clients>,
    ctx: Context,
}

impl Deployment {
    /// Creates an empty deployment in the `provisioning` state
    pub fn new(
        name: impl Into<String>,
        params: DeploymentParams,
        provisioner: Arc<dyn Provisioner>,
        ctx: &Context,
    ) -> Self {
        let name = name.into();
        let ctx = ctx.for_deployment(&name);
        Self {
            name,
            params,
            status: Status::Provisioning,
            provisioner,
            features: Vec::new(),
            nodes: Vec::new(),
            overrides: Map::new(),
            clients: None,
            ctx,
        }
    }

    /// Rebuilds a deployment from the node records in the local store
    ///
    /// Every record whose `deployment` attribute names this deployment is
    /// restored, in name order. Records without an owner are skipped. Each
    /// node resolves its own provisioner from its archive. The first node
    /// that fails to restore aborts the whole restore; nodes restored before
    /// it are left running.
    pub async fn restore(
        name: impl Into<String>,
        params: DeploymentParams,
        provisioner: Arc<dyn Provisioner>,
        ctx: &Context,
    ) -> Result<Self> {
        let mut deployment = Self::new(name, params, provisioner, ctx);
        let span = deployment.ctx.span().clone();

        async {
            let prefix = format!("{}-", deployment.name);
            let names = deployment.ctx.environment.local().list().await?;

            for name in names.iter().filter(|name| name.starts_with(&prefix)) {
                let record = deployment.ctx.environment.record(name).await?;
                match record.deployment() {
                    Some(owner) if owner == deployment.name => {}
                    Some(owner) => {
                        debug!("{} belongs to {}, skipping", name, owner);
                        continue;
                    }
                    None => {
                        warn!("{} has no owning deployment recorded, skipping", name);
                        continue;
                    }
                }

                let node = Node::from_record(
                    &record,
                    deployment.node_params(),
                    None,
                    &deployment.ctx,
                )
                .await?;
                deployment.nodes.push(node);
            }

            info!("Restored {} node(s) for {}", deployment.nodes.len(), deployment.name);
            Ok::<_, OrchestratorError>(())
        }
        .instrument(span)
        .await?;

        Ok(deployment)
    }

    pub fn with_clients(mut self, clients: Clients) -> Self {
        self.clients = Some(clients);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn os(&self) -> &str {
        &self.params.os
    }

    pub fn branch(&self) -> &str {
        &self.params.branch
    }

    pub fn product(&self) -> &str {
        &self.params.product
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn provisioner(&self) -> &Arc<dyn Provisioner> {
        &self.provisioner
    }

    pub fn clients(&self) -> Option<&Clients> {
        self.clients.as_ref()
    }

    /// Environment overrides contributed by features
    pub fn overrides(&self) -> &Map<String, Value> {
        &self.overrides
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.name() == name)
    }

    /// Placement parameters for nodes of this deployment
    pub fn node_params(&self) -> NodeParams {
        NodeParams {
            deployment: self.name.clone(),
            os: self.params.os.clone(),
            product: self.params.product.clone(),
            branch: self.params.branch.clone(),
        }
    }

    /// Lowercase tags of attached features, in attachment order
    pub fn feature_names(&self) -> Vec<String> {
        self.features
            .iter()
            .map(|feature| feature.name().to_lowercase())
            .collect()
    }

    /// Whether a feature with this tag is attached (case-insensitive)
    pub fn feature_in(&self, feature: &str) -> bool {
        let feature = feature.to_lowercase();
        self.features
            .iter()
            .any(|attached| attached.name().to_lowercase() == feature)
    }

    /// Nodes carrying a feature tag (case-insensitive), in list order
    pub fn search_role<'a>(&'a self, feature: &str) -> impl Iterator<Item = &'a Node> + use<'a> {
        node::with_feature(&self.nodes, feature)
    }

    /// Resolves and attaches deployment features
    ///
    /// All names are resolved before any is attached, so an unknown name
    /// leaves the feature set unchanged.
    pub fn add_features<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        debug!("deployment:{} feature add:{:?}", self.name, names);

        let features = names
            .iter()
            .map(|name| self.ctx.registry.deployment_feature(name, &self.name))
            .collect::<Result<Vec<_>>>()?;
        self.features.extend(features);
        Ok(())
    }

    /// Adds an existing node to the deployment
    ///
    /// The node must belong to this deployment, be named
    /// `<deployment>-<suffix>`, and not clash with a node already present.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        self.ensure_active()?;

        let invalid = |reason: &str| OrchestratorError::InvalidNode {
            node: node.name().to_string(),
            deployment: self.name.clone(),
            reason: reason.to_string(),
        };

        if node.deployment() != self.name {
            return Err(invalid("node belongs to another deployment"));
        }
        if !node.name().starts_with(&format!("{}-", self.name)) || node.short_name().is_empty() {
            return Err(invalid("node name must be <deployment>-<suffix>"));
        }
        if self.node(node.name()).is_some() {
            return Err(invalid("a node with this name already exists"));
        }

        self.nodes.push(node);
        Ok(())
    }

    /// Detaches a node without destroying it
    pub fn remove_node(&mut self, name: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|node| node.name() == name)?;
        Some(self.nodes.remove(index))
    }

    /// Provisions a node named `<deployment>-<suffix>` and adds it
    ///
    /// `features` are attached after the resource is created; if that
    /// fails the node is destroyed again and never joins the deployment.
    pub async fn provision_node<S: AsRef<str>>(
        &mut self,
        suffix: &str,
        connection: Option<Connection>,
        features: &[S],
    ) -> Result<&Node> {
        self.ensure_active()?;

        let name = format!("{}-{}", self.name, suffix);
        if suffix.is_empty() || self.node(&name).is_some() {
            return Err(OrchestratorError::InvalidNode {
                node: name,
                deployment: self.name.clone(),
                reason: "node suffix must be non-empty and unused".to_string(),
            });
        }

        let mut node = Node::provision(
            name,
            connection,
            self.node_params(),
            self.provisioner.clone(),
            &self.ctx,
        )
        .instrument(self.ctx.span().clone())
        .await?;

        if let Err(e) = node.add_features(features).await {
            error!("Failed to attach features to {}: {}", node.name(), e);
            if let Err(destroy) = node.destroy().await {
                error!("Failed to destroy {}: {}", node.name(), destroy);
            }
            return Err(e);
        }

        self.nodes.push(node);
        Ok(&self.nodes[self.nodes.len() - 1])
    }

    fn ensure_active(&self) -> Result<()> {
        if self.status.is_torn_down() {
            return Err(OrchestratorError::DeploymentDestroyed(self.name.clone()));
        }
        Ok(())
    }

    /// Lets every feature contribute environment overrides, in order
    pub async fn update_environment(&mut self) -> Result<()> {
        self.ensure_active()?;
        let span = self.ctx.span().clone();

        async {
            info!("Deployment step: update environment");
            self.status = Status::LoadingEnvironment;

            let mut scope = scope(&self.name, &self.params, &mut self.overrides, &self.nodes);
            for feature in &self.features {
                debug!("Deployment feature: update environment: {}", feature.name());
                feature.update_environment(&mut scope).await?;
            }

            debug!("{} environment: {:?}", self.name, self.overrides);
            self.status = Status::EnvironmentReady;
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Runs every feature's `pre_configure`, in order
    pub async fn pre_configure(&mut self) -> Result<()> {
        self.ensure_active()?;
        let span = self.ctx.span().clone();

        async {
            info!("Deployment step: pre-configure");
            self.status = Status::PreConfigure;

            let mut scope = scope(&self.name, &self.params, &mut self.overrides, &self.nodes);
            for feature in &self.features {
                debug!("Deployment feature: pre-configure: {}", feature.name());
                feature.pre_configure(&mut scope).await?;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Builds every node sequentially, in list order
    pub async fn build_nodes(&mut self) -> Result<()> {
        self.ensure_active()?;
        let span = self.ctx.span().clone();

        async {
            info!("Deployment step: build nodes");
            self.status = Status::BuildingNodes;

            for node in &mut self.nodes {
                node.build().await?;
            }

            self.status = Status::NodesBuilt;
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Runs every feature's `post_configure`, in order
    pub async fn post_configure(&mut self) -> Result<()> {
        self.ensure_active()?;
        let span = self.ctx.span().clone();

        async {
            info!("Deployment step: post-configure");
            self.status = Status::PostConfigure;

            let mut scope = scope(&self.name, &self.params, &mut self.overrides, &self.nodes);
            for feature in &self.features {
                debug!("Deployment feature: post-configure: {}", feature.name());
                feature.post_configure(&mut scope).await?;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Runs the full pipeline, ending in `post-build`
    ///
    /// A failing step aborts the build. Nodes built before the failure keep
    /// running.
    pub async fn build(&mut self) -> Result<()> {
        info!("Building deployment {}", self.name);
        self.update_environment().await?;
        self.pre_configure().await?;
        self.build_nodes().await?;
        self.post_configure().await?;
        self.status = Status::PostBuild;
        info!("{}", self);
        Ok(())
    }

    /// Destroys every node, then marks the deployment destroyed
    ///
    /// All nodes are attempted even when some fail; nodes that are already
    /// destroyed are skipped. Failures are returned together as `Destroy`.
    pub async fn destroy(&mut self) -> Result<()> {
        let span = self.ctx.span().clone();

        async {
            info!("Destroying deployment {}", self.name);
            self.status = Status::Destroying;

            let mut failures = Vec::new();
            for node in &mut self.nodes {
                if node.status() == Status::Destroyed {
                    debug!("{} already destroyed", node.name());
                    continue;
                }
                if let Err(e) = node.destroy().await {
                    warn!("Failed to destroy {}: {}", node.name(), e);
                    failures.push((node.name().to_string(), e));
                }
            }

            self.status = Status::Destroyed;
            if failures.is_empty() {
                Ok(())
            } else {
                Err(OrchestratorError::Destroy {
                    deployment: self.name.clone(),
                    failures,
                })
            }
        }
        .instrument(span)
        .await
    }

    /// Collects archives from every feature, then from every node
    pub async fn artifact(&mut self, plan: &ArchivePlan) -> Result<()> {
        self.ensure_active()?;
        let span = self.ctx.span().clone();

        async {
            info!("Archiving deployment {}", self.name);

            let mut scope = scope(&self.name, &self.params, &mut self.overrides, &self.nodes);
            for feature in &self.features {
                feature.archive(&mut scope, plan).await?;
            }

            for node in &mut self.nodes {
                node.archive(plan).await?;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    pub fn summary(&self) -> DeploymentSummary {
        DeploymentSummary {
            name: self.name.clone(),
            os: self.params.os.clone(),
            branch: self.params.branch.clone(),
            product: self.params.product.clone(),
            provisioner: self.provisioner.name().to_string(),
            status: self.status,
            features: self.feature_names(),
            nodes: self.nodes.iter().map(Node::summary).collect(),
        }
    }
}

fn scope<'a>(
    name: &'a str,
    params: &'a DeploymentParams,
    overrides: &'a mut Map<String, Value>,
    nodes: &'a [Node],
) -> DeploymentScope<'a> {
    DeploymentScope {
        name,
        os: &params.os,
        branch: &params.branch,
        product: &params.product,
        overrides,
        nodes,
    }
}

impl std::fmt::Display for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Deployment - name:{}, os:{}, branch:{}, status:{}\n{}",
            self.name,
            self.params.os,
            self.params.branch,
            self.status,
            self.feature_names().join(", ")
        )?;
        if let Some(clients) = &self.clients {
            write!(f, "\nClients: {}", clients.services().collect::<Vec<_>>().join(", "))?;
        }
        for node in &self.nodes {
            write!(f, "\n\t{}", node)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("features", &self.feature_names())
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RecordStore;
    use crate::testing::{Harness, connection, deployment_params, node_params};
    use monster_core::domain::record::NodeRecord;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn deployment(harness: &Harness) -> Deployment {
        Deployment::new("dep", deployment_params(), harness.provisioner.clone(), &harness.ctx)
    }

    async fn with_nodes(harness: &Harness, features: &[&str], nodes: &[(&str, &[&str])]) -> Deployment {
        let mut deployment = deployment(harness);
        deployment.add_features(features).unwrap();
        for &(suffix, node_features) in nodes {
            deployment
                .provision_node(suffix, None, node_features)
                .await
                .unwrap();
        }
        harness.log.clear();
        deployment
    }

    fn without_commands(events: Vec<String>) -> Vec<String> {
        events
            .into_iter()
            .filter(|event| !event.starts_with("cmd:"))
            .collect()
    }

    #[tokio::test]
    async fn test_build_runs_pipeline_in_order() {
        let harness = Harness::new();
        let mut deployment = with_nodes(
            &harness,
            &["first", "second"],
            &[("n1", &["alpha"]), ("n2", &["beta"])],
        )
        .await;

        deployment.build().await.unwrap();

        assert_eq!(
            without_commands(harness.log.events()),
            vec![
                "first:saw:0",
                "first:update_environment",
                "second:saw:1",
                "second:update_environment",
                "first:pre_configure",
                "second:pre_configure",
                "alpha:pre_configure:dep-n1",
                "alpha:apply_feature:dep-n1",
                "alpha:post_configure:dep-n1",
                "beta:pre_configure:dep-n2",
                "beta:apply_feature:dep-n2",
                "beta:post_configure:dep-n2",
                "first:post_configure",
                "second:post_configure",
            ]
        );
        assert_eq!(deployment.status(), Status::PostBuild);
        assert!(deployment.nodes().iter().all(|node| node.status() == Status::Done));
        assert_eq!(deployment.overrides().get("second"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_failed_step_aborts_pipeline() {
        let harness = Harness::new();
        let mut deployment = with_nodes(
            &harness,
            &["first", "fails-pre", "second"],
            &[("n1", &["alpha"])],
        )
        .await;

        let err = deployment.build().await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Hook { .. }));
        assert_eq!(deployment.status(), Status::PreConfigure);
        assert!(harness.log.matching("second:pre_configure").is_empty());
        assert!(harness.log.matching("alpha:").is_empty());
        assert_eq!(deployment.nodes()[0].status(), Status::Provisioning);
    }

    #[tokio::test]
    async fn test_failed_node_keeps_earlier_nodes_built() {
        let harness = Harness::new();
        let mut deployment = with_nodes(
            &harness,
            &[],
            &[("n1", &["alpha"]), ("n2", &["fails-post"]), ("n3", &["beta"])],
        )
        .await;

        deployment.build().await.unwrap_err();

        assert_eq!(deployment.status(), Status::BuildingNodes);
        let statuses: Vec<Status> = deployment.nodes().iter().map(Node::status).collect();
        assert_eq!(
            statuses,
            vec![Status::Done, Status::PostConfigure, Status::Provisioning]
        );
        assert_eq!(harness.provisioner.destroyed(), 0);
    }

    #[tokio::test]
    async fn test_destroy_is_terminal() {
        let harness = Harness::new();
        let mut deployment = with_nodes(&harness, &["first"], &[("n1", &[]), ("n2", &[])]).await;

        deployment.destroy().await.unwrap();

        assert_eq!(deployment.status(), Status::Destroyed);
        assert!(deployment.nodes().iter().all(|node| node.status() == Status::Destroyed));
        assert_eq!(harness.provisioner.destroyed(), 2);
        assert!(harness.store.list().await.unwrap().is_empty());
        assert!(matches!(
            deployment.build().await.unwrap_err(),
            OrchestratorError::DeploymentDestroyed(_)
        ));
        assert!(harness.log.matching("first:").is_empty());
    }

    #[tokio::test]
    async fn test_destroy_attempts_every_node() {
        let harness = Harness::new();
        let mut deployment = with_nodes(&harness, &[], &[("n1", &[]), ("n2", &[])]).await;
        harness.provisioner.fail_destroy.store(true, Ordering::SeqCst);

        let err = deployment.destroy().await.unwrap_err();

        match err {
            OrchestratorError::Destroy { deployment, failures } => {
                assert_eq!(deployment, "dep");
                let names: Vec<&str> = failures.iter().map(|(name, _)| name.as_str()).collect();
                assert_eq!(names, vec!["dep-n1", "dep-n2"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(harness.log.events(), vec!["destroy:dep-n1", "destroy:dep-n2"]);
        assert_eq!(deployment.status(), Status::Destroyed);
    }

    #[tokio::test]
    async fn test_destroy_skips_destroyed_nodes() {
        let harness = Harness::new();
        let mut deployment = with_nodes(&harness, &[], &[("n1", &[]), ("n2", &[])]).await;
        deployment.node_mut("dep-n1").unwrap().destroy().await.unwrap();

        deployment.destroy().await.unwrap();

        assert_eq!(harness.log.events(), vec!["destroy:dep-n1", "destroy:dep-n2"]);
        assert_eq!(harness.provisioner.destroyed(), 2);
    }

    #[tokio::test]
    async fn test_restore_picks_prefixed_records_in_order() {
        let harness = Harness::new();
        harness.seed("dep-n2", &["beta"], "done", "p1").await;
        harness.seed("dep-n1", &["alpha"], "post-configure", "p1").await;
        harness.seed("other-n1", &["alpha"], "done", "p1").await;

        let deployment = Deployment::restore(
            "dep",
            deployment_params(),
            harness.provisioner.clone(),
            &harness.ctx,
        )
        .await
        .unwrap();

        let names: Vec<&str> = deployment.nodes().iter().map(Node::name).collect();
        assert_eq!(names, vec!["dep-n1", "dep-n2"]);
        assert_eq!(deployment.nodes()[0].status(), Status::PostConfigure);
        assert_eq!(deployment.nodes()[1].feature_names(), vec!["beta"]);
        assert_eq!(deployment.status(), Status::Provisioning);
    }

    #[tokio::test]
    async fn test_restore_ignores_nodes_of_other_deployments() {
        let harness = Harness::new();
        harness.seed_in("dep", "dep-n1", &["alpha"], "done", "p1").await;
        harness.seed_in("dep-x", "dep-x-n1", &["beta"], "done", "p1").await;

        let mut deployment = Deployment::restore(
            "dep",
            deployment_params(),
            harness.provisioner.clone(),
            &harness.ctx,
        )
        .await
        .unwrap();
        let names: Vec<&str> = deployment.nodes().iter().map(Node::name).collect();
        assert_eq!(names, vec!["dep-n1"]);

        deployment.destroy().await.unwrap();

        assert_eq!(harness.store.list().await.unwrap(), vec!["dep-x-n1"]);
        assert_eq!(harness.log.events(), vec!["destroy:dep-n1"]);

        let other = Deployment::restore(
            "dep-x",
            deployment_params(),
            harness.provisioner.clone(),
            &harness.ctx,
        )
        .await
        .unwrap();
        let names: Vec<&str> = other.nodes().iter().map(Node::name).collect();
        assert_eq!(names, vec!["dep-x-n1"]);
    }

    #[tokio::test]
    async fn test_restore_skips_records_without_owner() {
        let harness = Harness::new();
        harness.seed("dep-n1", &["alpha"], "done", "p1").await;
        let orphan = NodeRecord::new("dep-n2").with_connection(&connection("10.0.0.2"));
        harness.store.save(&orphan).await.unwrap();

        let deployment = Deployment::restore(
            "dep",
            deployment_params(),
            harness.provisioner.clone(),
            &harness.ctx,
        )
        .await
        .unwrap();

        let names: Vec<&str> = deployment.nodes().iter().map(Node::name).collect();
        assert_eq!(names, vec!["dep-n1"]);
    }

    #[tokio::test]
    async fn test_provisioned_node_records_owner() {
        let harness = Harness::new();
        let mut deployment = deployment(&harness);

        deployment
            .provision_node("web-1", None, &["alpha"])
            .await
            .unwrap();

        let record = harness.store.load("dep-web-1").await.unwrap().unwrap();
        assert_eq!(record.deployment(), Some("dep"));
    }

    #[tokio::test]
    async fn test_restore_fails_on_unknown_feature() {
        let harness = Harness::new();
        harness.seed("dep-n1", &["ghost"], "done", "p1").await;

        let err = Deployment::restore(
            "dep",
            deployment_params(),
            harness.provisioner.clone(),
            &harness.ctx,
        )
        .await
        .unwrap_err();

        assert!(matches!(&err, OrchestratorError::Restore { node, .. } if node == "dep-n1"));
        assert!(err.is_unknown_capability());
    }

    #[tokio::test]
    async fn test_add_node_validates_membership() {
        let harness = Harness::new();
        let mut deployment = deployment(&harness);
        let node = |name: &str, owner: &str| {
            Node::new(
                name,
                connection("10.0.0.5"),
                node_params(owner),
                harness.provisioner.clone(),
                &harness.ctx,
            )
        };

        deployment.add_node(node("dep-n1", "dep")).unwrap();

        for (name, owner) in [("other-n1", "other"), ("depn2", "dep"), ("dep-", "dep"), ("dep-n1", "dep")] {
            let err = deployment.add_node(node(name, owner)).unwrap_err();
            assert!(matches!(err, OrchestratorError::InvalidNode { .. }), "{name}");
        }
        assert_eq!(deployment.nodes().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_node_detaches_without_destroying() {
        let harness = Harness::new();
        let mut deployment = with_nodes(&harness, &[], &[("n1", &[])]).await;

        let node = deployment.remove_node("dep-n1").unwrap();

        assert_eq!(node.status(), Status::Provisioning);
        assert!(deployment.nodes().is_empty());
        assert!(deployment.remove_node("dep-n1").is_none());
        assert_eq!(harness.provisioner.destroyed(), 0);
    }

    #[tokio::test]
    async fn test_provision_node_destroys_on_unknown_feature() {
        let harness = Harness::new();
        let mut deployment = deployment(&harness);

        let err = deployment
            .provision_node("n1", None, &["alpha", "ghost"])
            .await
            .unwrap_err();

        assert!(err.is_unknown_capability());
        assert!(deployment.nodes().is_empty());
        assert_eq!(harness.provisioner.destroyed(), 1);
        assert!(harness.store.load("dep-n1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provision_node_rejects_duplicate_suffix() {
        let harness = Harness::new();
        let mut deployment = with_nodes(&harness, &[], &[("n1", &[])]).await;

        let err = deployment
            .provision_node::<&str>("n1", None, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::InvalidNode { .. }));
        assert!(harness.log.matching("create:").is_empty());
    }

    #[tokio::test]
    async fn test_search_role_filters_in_order() {
        let harness = Harness::new();
        let deployment = with_nodes(
            &harness,
            &[],
            &[("n1", &["alpha"]), ("n2", &["beta"]), ("n3", &["beta", "alpha"])],
        )
        .await;

        let names: Vec<&str> = deployment.search_role("ALPHA").map(Node::name).collect();
        assert_eq!(names, vec!["dep-n1", "dep-n3"]);
        assert_eq!(deployment.search_role("gamma").count(), 0);
    }

    #[tokio::test]
    async fn test_add_features_is_all_or_nothing() {
        let harness = Harness::new();
        let mut deployment = deployment(&harness);
        deployment.add_features(&["first"]).unwrap();

        let err = deployment.add_features(&["second", "ghost"]).unwrap_err();

        assert!(err.is_unknown_capability());
        assert_eq!(deployment.feature_names(), vec!["first"]);
        assert!(deployment.feature_in("FIRST"));
    }

    #[tokio::test]
    async fn test_artifact_archives_features_then_nodes() {
        let harness = Harness::new();
        let mut deployment = with_nodes(&harness, &["first"], &[("n1", &["alpha"])]).await;

        deployment.artifact(&ArchivePlan::new("rpm -qa")).await.unwrap();

        let events = harness.log.events();
        assert_eq!(events[0], "first:archive");
        assert_eq!(events[1], "alpha:archive:dep-n1");
        assert!(events[2].ends_with("rpm -qa > /tmp/monster-archive/packages.txt"));
    }

    #[tokio::test]
    async fn test_artifact_refused_after_destroy() {
        let harness = Harness::new();
        let mut deployment = with_nodes(&harness, &["first"], &[("n1", &["alpha"])]).await;
        deployment.destroy().await.unwrap();
        harness.log.clear();

        let err = deployment
            .artifact(&ArchivePlan::new("dpkg -l"))
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::DeploymentDestroyed(_)));
        assert!(harness.log.events().is_empty());
    }

    #[tokio::test]
    async fn test_summary_and_clients() {
        let harness = Harness::new();
        let deployment = with_nodes(&harness, &["first"], &[("n1", &["alpha"])])
            .await
            .with_clients(Clients::new().with_endpoint("keystone", "http://10.0.0.1:5000"));

        let summary = deployment.summary();

        assert_eq!(summary.provisioner, "p1");
        assert_eq!(summary.features, vec!["first"]);
        assert_eq!(summary.nodes_with("alpha").count(), 1);
        assert_eq!(
            deployment.clients().and_then(|c| c.endpoint("keystone")),
            Some("http://10.0.0.1:5000")
        );
        assert!(deployment.to_string().contains("Clients: keystone"));
    }

    #[tokio::test]
    async fn test_openstack_features_build_environment() {
        let harness = Harness::new();
        let mut deployment = with_nodes(
            &harness,
            &["openstack", "neutron", "keystone"],
            &[("ctl", &["controller"]), ("net", &["network"])],
        )
        .await;

        deployment.build().await.unwrap();

        assert_eq!(
            deployment.overrides()["neutron"],
            json!({"plugin": "ml2", "release": "grizzly"})
        );
        assert_eq!(deployment.overrides()["openstack"]["os"], json!("ubuntu"));
        let commands = harness.log.matching("cmd:");
        assert!(commands.contains(&"cmd:dep-net:source /root/openrc && neutron agent-list".to_string()));
        assert!(commands.contains(&"cmd:dep-ctl:source /root/openrc && keystone user-list".to_string()));
        assert_eq!(
            deployment.node("dep-ctl").unwrap().run_list(),
            ["role[ha-controller1]"]
        );
    }

    #[tokio::test]
    async fn test_neutron_requires_openstack_first() {
        let harness = Harness::new();
        let mut deployment = with_nodes(&harness, &["neutron", "openstack"], &[]).await;

        let err = deployment.update_environment().await.unwrap_err();

        assert!(matches!(err, OrchestratorError::Hook { feature, .. } if feature == "neutron"));
        assert_eq!(deployment.status(), Status::LoadingEnvironment);
    }
}
