//! Nodes
//!
//! A [`Node`] is one managed host in a deployment. It pairs the host state
//! ([`Host`]: identity, credentials, status, run-list, collaborators) with
//! the features attached to it. Features receive `&mut Host` in their
//! hooks, which lets them drive the host without owning the node.
//!
//! Every mutation of the feature set, status or run-list is written back to
//! the management hub before the operation returns; the persisted archive
//! record is what [`Node::from_record`] rebuilds a node from after a
//! restart.

use std::sync::Arc;

use monster_core::domain::command::{CommandOutput, Connection};
use monster_core::domain::record::{
    ADDRESS_KEY, ARCHIVE_KEY, ArchiveRecord, DEPLOYMENT_KEY, NodeRecord, PASSWORD_KEY, USER_KEY,
};
use monster_core::domain::status::Status;
use monster_core::dto::NodeSummary;
use serde_json::Value;
use tracing::{Instrument, debug, error, info, warn};

use crate::context::Context;
use crate::error::{OrchestratorError, Result};
use crate::feature::{ArchivePlan, CHEF_SERVER, NodeFeature};
use crate::provisioner::{NodeHandle, ProvisionSpec, Provisioner};

/// Where a node sits: its deployment and what it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeParams {
    /// Name of the owning deployment
    pub deployment: String,
    pub os: String,
    pub product: String,
    pub branch: String,
}

/// Host state of a node, everything except its features
pub struct Host {
    name: String,
    connection: Connection,
    params: NodeParams,
    status: Status,
    run_list: Vec<String>,
    provisioner: Arc<dyn Provisioner>,
    ctx: Context,
}

impl Host {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn os(&self) -> &str {
        &self.params.os
    }

    pub fn product(&self) -> &str {
        &self.params.product
    }

    pub fn branch(&self) -> &str {
        &self.params.branch
    }

    /// Name of the owning deployment
    pub fn deployment(&self) -> &str {
        &self.params.deployment
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// In-memory run-list
    pub fn run_list(&self) -> &[String] {
        &self.run_list
    }

    pub fn provisioner(&self) -> &Arc<dyn Provisioner> {
        &self.provisioner
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Runs a command on this host
    ///
    /// # Errors
    /// `Connection` if the command could not be run, `CommandFailed` if it
    /// exited non-zero.
    pub async fn run_cmd(&self, command: &str) -> Result<CommandOutput> {
        let output = self
            .ctx
            .runner
            .run(&self.name, &self.connection, command)
            .await?;

        if !output.is_success() {
            return Err(OrchestratorError::CommandFailed {
                node: self.name.clone(),
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }

    /// Appends items to the run-list and persists the full list
    pub async fn add_run_list_item<I, S>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        debug!("run_list:{:?} add:{:?}", self.run_list, items);
        self.run_list.extend(items);
        self.persist_run_list().await
    }

    /// Run-list as stored in the management hub
    pub async fn get_run_list(&self) -> Result<Vec<String>> {
        Ok(self.ctx.environment.record(&self.name).await?.run_list)
    }

    /// Reads an attribute from the node's record
    pub async fn get_attribute(&self, key: &str) -> Result<Option<Value>> {
        self.ctx.environment.get(&self.name, key).await
    }

    /// Writes an attribute to the node's record and saves the whole record
    pub async fn set_attribute(&self, key: &str, value: Value) -> Result<()> {
        debug!("setting {} to {} on {}", key, value, self.name);
        let mut record = self.record_or_new().await?;
        record.set_attribute(key, value);
        self.ctx.environment.save(&record).await
    }

    /// Runs the management hub client `times` times in sequence
    ///
    /// The local record is refreshed from the hub after each run. A failed
    /// run aborts the remaining ones.
    pub async fn run_chef_client(&self, times: u32) -> Result<()> {
        for run in 1..=times {
            debug!("chef-client run {}/{} on {}", run, times, self.name);
            self.run_cmd("chef-client").await?;
            self.ctx.environment.save_locally(&self.name).await?;
        }
        Ok(())
    }

    async fn clear_run_list(&mut self) -> Result<()> {
        self.run_list.clear();
        self.persist_run_list().await
    }

    async fn persist_run_list(&self) -> Result<()> {
        let mut record = self.record_or_new().await?;
        record.run_list = self.run_list.clone();
        self.ctx.environment.save(&record).await
    }

    async fn record_or_new(&self) -> Result<NodeRecord> {
        let record = self.ctx.environment.local().load(&self.name).await?;
        Ok(record.unwrap_or_else(|| NodeRecord::new(&self.name).with_connection(&self.connection)))
    }

    fn handle(&self) -> NodeHandle {
        NodeHandle {
            name: self.name.clone(),
            connection: self.connection.clone(),
        }
    }
}

/// A managed host and the features attached to it
pub struct Node {
    host: Host,
    features: Vec<Box<dyn NodeFeature>>,
}

impl Node {
    /// Creates a node with no features in the `provisioning` state
    ///
    /// Nothing is persisted until the node is mutated.
    pub fn new(
        name: impl Into<String>,
        connection: Connection,
        params: NodeParams,
        provisioner: Arc<dyn Provisioner>,
        ctx: &Context,
    ) -> Self {
        Self::with_state(
            name.into(),
            connection,
            params,
            provisioner,
            ctx,
            Status::Provisioning,
            Vec::new(),
        )
    }

    fn with_state(
        name: String,
        connection: Connection,
        params: NodeParams,
        provisioner: Arc<dyn Provisioner>,
        ctx: &Context,
        status: Status,
        run_list: Vec<String>,
    ) -> Self {
        let ctx = ctx.for_node(&name);
        Self {
            host: Host {
                name,
                connection,
                params,
                status,
                run_list,
                provisioner,
                ctx,
            },
            features: Vec::new(),
        }
    }

    /// Creates the node's resource through `provisioner` and records it
    ///
    /// If the record cannot be written the resource is released again.
    pub async fn provision(
        name: impl Into<String>,
        connection: Option<Connection>,
        params: NodeParams,
        provisioner: Arc<dyn Provisioner>,
        ctx: &Context,
    ) -> Result<Node> {
        let spec = ProvisionSpec {
            name: name.into(),
            os: params.os.clone(),
            product: params.product.clone(),
            branch: params.branch.clone(),
            connection,
        };

        info!("Provisioning {} with {}", spec.name, provisioner.name());
        let handle = provisioner.create(&spec).await?;

        let mut record = NodeRecord::new(&handle.name).with_connection(&handle.connection);
        record.set_attribute(DEPLOYMENT_KEY, Value::String(params.deployment.clone()));
        if let Err(e) = ctx.environment.save(&record).await {
            error!("Failed to record {}, releasing it: {}", handle.name, e);
            if let Err(release) = provisioner.destroy(&handle).await {
                error!("Failed to release {}: {}", handle.name, release);
            }
            return Err(e);
        }

        let mut node = Node::new(handle.name, handle.connection, params, provisioner, ctx);
        node.save_archive().await?;
        Ok(node)
    }

    /// Rebuilds a node from its persisted record
    ///
    /// Address, credentials, name and run-list come straight from the
    /// record; status, provisioner tag and feature tags come from its
    /// archive. When `provisioner` is `None` the archived tag is resolved
    /// through the registry, falling back to the configured default.
    ///
    /// If the features cannot be rebuilt the node is destroyed before the
    /// error is returned, so no half-restored node is left holding a
    /// resource. Every failure is reported as `Restore` naming the node.
    pub async fn from_record(
        record: &NodeRecord,
        params: NodeParams,
        provisioner: Option<Arc<dyn Provisioner>>,
        ctx: &Context,
    ) -> Result<Node> {
        let wrap = |source: OrchestratorError| OrchestratorError::Restore {
            node: record.name.clone(),
            source: Box::new(source),
        };

        let connection = connection_from(record).map_err(wrap)?;
        let archive = record
            .archive()
            .map_err(|e| OrchestratorError::InvalidRecord {
                node: record.name.clone(),
                reason: format!("undecodable {}: {}", ARCHIVE_KEY, e),
            })
            .map_err(wrap)?
            .unwrap_or_default();

        let provisioner = match provisioner {
            Some(provisioner) => provisioner,
            None => {
                let tag = archive
                    .provisioner
                    .as_deref()
                    .unwrap_or(&ctx.config.default_provisioner);
                ctx.registry.provisioner(tag).map_err(wrap)?
            }
        };

        let mut node = Node::with_state(
            record.name.clone(),
            connection,
            params,
            provisioner,
            ctx,
            archive.status,
            record.run_list.clone(),
        );

        if let Err(e) = node.add_features(&archive.features).await {
            error!("Restoring features of {} failed: {}", node.name(), e);
            if let Err(destroy) = node.destroy().await {
                error!("Failed to destroy {} after restore failure: {}", node.name(), destroy);
            }
            return Err(wrap(e));
        }

        info!("Restored {}", node);
        Ok(node)
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn name(&self) -> &str {
        &self.host.name
    }

    /// Name without the `<deployment>-` prefix
    pub fn short_name(&self) -> &str {
        self.host
            .name
            .strip_prefix(self.host.deployment())
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or(&self.host.name)
    }

    pub fn status(&self) -> Status {
        self.host.status
    }

    pub fn deployment(&self) -> &str {
        self.host.deployment()
    }

    pub fn connection(&self) -> &Connection {
        &self.host.connection
    }

    pub fn provisioner(&self) -> &Arc<dyn Provisioner> {
        &self.host.provisioner
    }

    pub fn run_list(&self) -> &[String] {
        &self.host.run_list
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

    /// Resolves and attaches features, then persists the archive record
    ///
    /// All names are resolved before any is attached, so an unknown name
    /// leaves the feature set unchanged.
    pub async fn add_features<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        debug!("node:{} feature add:{:?}", self.host.name, names);

        let features = names
            .iter()
            .map(|name| self.host.ctx.registry.node_feature(name, &self.host.name))
            .collect::<Result<Vec<_>>>()?;
        self.features.extend(features);

        self.save_archive().await
    }

    /// Writes features, status and provisioner tag to the archive attribute
    ///
    /// The owning deployment is recorded alongside, so a restore picks up
    /// exactly the nodes that belong to it.
    pub async fn save_archive(&self) -> Result<()> {
        let archive = ArchiveRecord {
            features: self.feature_names(),
            status: self.host.status,
            provisioner: Some(self.host.provisioner.name().to_lowercase()),
        };

        let mut record = self.host.record_or_new().await?;
        record.set_archive(&archive).map_err(|e| {
            OrchestratorError::store(format!("Failed to encode archive for {}: {}", self.name(), e))
        })?;
        record.set_attribute(DEPLOYMENT_KEY, Value::String(self.deployment().to_string()));
        self.host.ctx.environment.save(&record).await
    }

    async fn set_status(&mut self, status: Status) -> Result<()> {
        debug!("{} status: {} -> {}", self.host.name, self.host.status, status);
        self.host.status = status;
        self.save_archive().await
    }

    /// Builds the node
    ///
    /// Clears the run-list, then runs every feature's `pre_configure`,
    /// [`apply_feature`](Self::apply_feature), and every feature's
    /// `post_configure`, in attachment order. Ends in `done`.
    pub async fn build(&mut self) -> Result<()> {
        let span = self.host.ctx.span().clone();
        async {
            info!("Building node {}", self.host.name);
            self.host.clear_run_list().await?;

            self.set_status(Status::PreConfigure).await?;
            for feature in &self.features {
                debug!("Node feature: pre-configure: {}", feature.name());
                feature.pre_configure(&mut self.host).await?;
            }

            self.apply_feature().await?;

            self.set_status(Status::PostConfigure).await?;
            for feature in &self.features {
                debug!("Node feature: post-configure: {}", feature.name());
                feature.post_configure(&mut self.host).await?;
            }

            self.set_status(Status::Done).await
        }
        .instrument(span)
        .await
    }

    /// Applies features to the node
    ///
    /// Unless the node is the management hub itself, the hub client runs
    /// first so the node picks up its run-list.
    pub async fn apply_feature(&mut self) -> Result<()> {
        self.set_status(Status::ApplyFeature).await?;

        if !self.feature_in(CHEF_SERVER) {
            let runs = self.host.ctx.config.chef_client_runs;
            self.host.run_chef_client(runs).await?;
        }

        for feature in &self.features {
            debug!("Node feature: apply: {}", feature.name());
            feature.apply_feature(&mut self.host).await?;
        }
        Ok(())
    }

    /// Releases the node's resource and removes its record
    ///
    /// The resource is released first; if removing the record then fails the
    /// node still ends up `destroyed` and the store error is returned.
    pub async fn destroy(&mut self) -> Result<()> {
        if self.host.status == Status::Destroyed {
            return Err(OrchestratorError::AlreadyDestroyed(self.host.name.clone()));
        }

        let span = self.host.ctx.span().clone();
        async {
            info!("Destroying node {}", self.host.name);
            self.host.provisioner.destroy(&self.host.handle()).await?;
            self.host.status = Status::Destroyed;

            if let Err(e) = self.host.ctx.environment.delete(&self.host.name).await {
                warn!("Released {} but could not remove its record: {}", self.host.name, e);
                return Err(e);
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Archives each feature, then the node's installed package list
    pub async fn archive(&mut self, plan: &ArchivePlan) -> Result<()> {
        for feature in &self.features {
            feature.archive(&mut self.host, plan).await?;
        }

        let command = format!(
            "mkdir -p {misc} && {list} > {misc}/packages.txt",
            misc = plan.misc_path,
            list = plan.list_packages_cmd
        );
        self.host.run_cmd(&command).await?;
        Ok(())
    }

    pub async fn run_cmd(&self, command: &str) -> Result<CommandOutput> {
        self.host.run_cmd(command).await
    }

    pub async fn run_chef_client(&self, times: u32) -> Result<()> {
        self.host.run_chef_client(times).await
    }

    pub async fn add_run_list_item<I, S>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.host.add_run_list_item(items).await
    }

    pub async fn get_run_list(&self) -> Result<Vec<String>> {
        self.host.get_run_list().await
    }

    pub async fn get_attribute(&self, key: &str) -> Result<Option<Value>> {
        self.host.get_attribute(key).await
    }

    pub async fn set_attribute(&self, key: &str, value: Value) -> Result<()> {
        self.host.set_attribute(key, value).await
    }

    pub fn summary(&self) -> NodeSummary {
        NodeSummary {
            name: self.host.name.clone(),
            address: self.host.connection.address.clone(),
            os: self.host.params.os.clone(),
            branch: self.host.params.branch.clone(),
            status: self.host.status,
            provisioner: self.host.provisioner.name().to_string(),
            features: self.feature_names(),
            run_list: self.host.run_list.clone(),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Node - name:{}, os:{}, branch:{}, ip:{}, status:{}\n\t\tFeatures: {}",
            self.host.name,
            self.host.params.os,
            self.host.params.branch,
            self.host.connection.address,
            self.host.status,
            self.feature_names().join(", ")
        )
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.host.name)
            .field("status", &self.host.status)
            .field("features", &self.feature_names())
            .finish_non_exhaustive()
    }
}

/// Nodes carrying a feature tag (case-insensitive), in list order
pub(crate) fn with_feature<'a>(
    nodes: &'a [Node],
    feature: &str,
) -> impl Iterator<Item = &'a Node> + use<'a> {
    let feature = feature.to_lowercase();
    nodes.iter().filter(move |node| node.feature_in(&feature))
}

fn connection_from(record: &NodeRecord) -> Result<Connection> {
    let field = |key: &str| {
        record
            .string_attribute(key)
            .map(str::to_string)
            .ok_or_else(|| OrchestratorError::InvalidRecord {
                node: record.name.clone(),
                reason: format!("missing {}", key),
            })
    };

    Ok(Connection {
        address: field(ADDRESS_KEY)?,
        user: field(USER_KEY)?,
        password: field(PASSWORD_KEY)?,
    })
}
