//! Test doubles shared by the engine's unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use monster_core::domain::command::{CommandOutput, Connection};
use monster_core::domain::record::{DEPLOYMENT_KEY, NodeRecord};
use serde_json::json;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::deployment::{DeploymentParams, DeploymentScope};
use crate::environment::Environment;
use crate::error::{OrchestratorError, Result};
use crate::feature::{ArchivePlan, DeploymentFeature, NodeFeature};
use crate::node::{Host, NodeParams};
use crate::provisioner::{NodeHandle, ProvisionSpec, Provisioner};
use crate::registry::CapabilityRegistry;
use crate::repository::{MemoryRecordStore, RecordStore};
use crate::runner::CommandRunner;

/// Ordered log of everything the doubles observed
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Events starting with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| event.starts_with(prefix))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Logs every command as `cmd:<node>:<command>` and succeeds unless told not to
#[derive(Debug, Default)]
pub struct RecordingRunner {
    log: EventLog,
    /// Command substring to exit code
    failures: Mutex<HashMap<String, i32>>,
}

impl RecordingRunner {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Commands containing `needle` exit with `exit_code`
    pub fn fail_on(&self, needle: &str, exit_code: i32) {
        self.failures
            .lock()
            .unwrap()
            .insert(needle.to_string(), exit_code);
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        node: &str,
        _connection: &Connection,
        command: &str,
    ) -> Result<CommandOutput> {
        self.log.push(format!("cmd:{}:{}", node, command));

        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(needle, _)| command.contains(needle.as_str())) {
            Some((_, &exit_code)) => Ok(CommandOutput {
                stdout: String::new(),
                stderr: "boom".to_string(),
                exit_code,
            }),
            None => Ok(CommandOutput::success("ok")),
        }
    }
}

/// Node feature logging `<name>:<hook>:<owner>` for every hook
pub struct RecordingNodeFeature {
    name: String,
    owner: String,
    log: EventLog,
    fail_in: Option<&'static str>,
}

impl RecordingNodeFeature {
    pub fn new(name: &str, owner: &str, log: EventLog) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            log,
            fail_in: None,
        }
    }

    fn record(&self, hook: &'static str) -> Result<()> {
        self.log.push(format!("{}:{}:{}", self.name, hook, self.owner));
        if self.fail_in == Some(hook) {
            return Err(OrchestratorError::hook(&self.name, format!("{} failed", hook)));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeFeature for RecordingNodeFeature {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn pre_configure(&self, host: &mut Host) -> Result<()> {
        host.add_run_list_item([format!("recipe[{}]", self.name)])
            .await?;
        self.record("pre_configure")
    }

    async fn apply_feature(&self, _host: &mut Host) -> Result<()> {
        self.record("apply_feature")
    }

    async fn post_configure(&self, _host: &mut Host) -> Result<()> {
        self.record("post_configure")
    }

    async fn archive(&self, _host: &mut Host, _plan: &ArchivePlan) -> Result<()> {
        self.record("archive")
    }
}

/// Deployment feature logging `<name>:<hook>` for every hook
///
/// `update_environment` also logs how many override keys it saw and then
/// adds its own.
pub struct RecordingDeploymentFeature {
    name: String,
    owner: String,
    log: EventLog,
    fail_in: Option<&'static str>,
}

impl RecordingDeploymentFeature {
    pub fn new(name: &str, owner: &str, log: EventLog) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            log,
            fail_in: None,
        }
    }

    fn record(&self, hook: &'static str) -> Result<()> {
        self.log.push(format!("{}:{}", self.name, hook));
        if self.fail_in == Some(hook) {
            return Err(OrchestratorError::hook(&self.name, format!("{} failed", hook)));
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentFeature for RecordingDeploymentFeature {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn update_environment(&self, scope: &mut DeploymentScope<'_>) -> Result<()> {
        self.log
            .push(format!("{}:saw:{}", self.name, scope.overrides.len()));
        scope.overrides.insert(self.name.clone(), json!(true));
        self.record("update_environment")
    }

    async fn pre_configure(&self, _scope: &mut DeploymentScope<'_>) -> Result<()> {
        self.record("pre_configure")
    }

    async fn post_configure(&self, _scope: &mut DeploymentScope<'_>) -> Result<()> {
        self.record("post_configure")
    }

    async fn archive(&self, _scope: &mut DeploymentScope<'_>, _plan: &ArchivePlan) -> Result<()> {
        self.record("archive")
    }
}

/// Provisioner that counts calls and hands out sequential addresses
pub struct CountingProvisioner {
    tag: String,
    log: EventLog,
    pub creates: AtomicUsize,
    pub destroys: AtomicUsize,
    pub fail_destroy: AtomicBool,
}

impl CountingProvisioner {
    pub fn new(tag: &str, log: EventLog) -> Self {
        Self {
            tag: tag.to_string(),
            log,
            creates: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
            fail_destroy: AtomicBool::new(false),
        }
    }

    pub fn destroyed(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for CountingProvisioner {
    fn name(&self) -> &str {
        &self.tag
    }

    async fn create(&self, spec: &ProvisionSpec) -> Result<NodeHandle> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.push(format!("create:{}", spec.name));
        let connection = spec
            .connection
            .clone()
            .unwrap_or_else(|| connection(&format!("10.0.0.{}", n)));
        Ok(NodeHandle {
            name: spec.name.clone(),
            connection,
        })
    }

    async fn destroy(&self, handle: &NodeHandle) -> Result<()> {
        self.log.push(format!("destroy:{}", handle.name));
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(OrchestratorError::provision(format!(
                "cannot release {}",
                handle.name
            )));
        }
        self.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Record store whose writes can be switched off
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryRecordStore,
    pub fail_saves: AtomicBool,
    pub fail_deletes: AtomicBool,
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn load(&self, node: &str) -> Result<Option<NodeRecord>> {
        self.inner.load(node).await
    }

    async fn save(&self, record: &NodeRecord) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(OrchestratorError::store("store offline"));
        }
        self.inner.save(record).await
    }

    async fn delete(&self, node: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(OrchestratorError::store("store offline"));
        }
        self.inner.delete(node).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.inner.list().await
    }
}

pub fn connection(address: &str) -> Connection {
    Connection {
        address: address.to_string(),
        user: "root".to_string(),
        password: "secret".to_string(),
    }
}

pub fn node_params(deployment: &str) -> NodeParams {
    NodeParams {
        deployment: deployment.to_string(),
        os: "ubuntu".to_string(),
        product: "compute".to_string(),
        branch: "grizzly".to_string(),
    }
}

pub fn deployment_params() -> DeploymentParams {
    DeploymentParams {
        os: "ubuntu".to_string(),
        branch: "grizzly".to_string(),
        product: "compute".to_string(),
    }
}

/// Engine wired with recording doubles
///
/// Registers node features `alpha`, `beta` and `fails-post`, deployment
/// features `first`, `second` and `fails-pre`, and provisioner `p1` on top
/// of the built-ins.
pub struct Harness {
    pub log: EventLog,
    pub store: Arc<FailingStore>,
    pub runner: Arc<RecordingRunner>,
    pub provisioner: Arc<CountingProvisioner>,
    pub ctx: Context,
}

impl Harness {
    pub fn new() -> Self {
        let log = EventLog::default();
        let store = Arc::new(FailingStore::default());
        let runner = Arc::new(RecordingRunner::new(log.clone()));
        let provisioner = Arc::new(CountingProvisioner::new("p1", log.clone()));

        let mut registry = CapabilityRegistry::standard();
        for name in ["alpha", "beta"] {
            let log = log.clone();
            registry.register_node_feature(name, move |owner: &str| {
                Box::new(RecordingNodeFeature::new(name, owner, log.clone()))
            });
        }
        let failing = log.clone();
        registry.register_node_feature("fails-post", move |owner: &str| {
            Box::new(RecordingNodeFeature {
                fail_in: Some("post_configure"),
                ..RecordingNodeFeature::new("fails-post", owner, failing.clone())
            })
        });
        for name in ["first", "second"] {
            let log = log.clone();
            registry.register_deployment_feature(name, move |owner: &str| {
                Box::new(RecordingDeploymentFeature::new(name, owner, log.clone()))
            });
        }
        let failing = log.clone();
        registry.register_deployment_feature("fails-pre", move |owner: &str| {
            Box::new(RecordingDeploymentFeature {
                fail_in: Some("pre_configure"),
                ..RecordingDeploymentFeature::new("fails-pre", owner, failing.clone())
            })
        });
        let shared = provisioner.clone();
        registry.register_provisioner("p1", move || shared.clone());

        let environment = Arc::new(Environment::new("test", store.clone()));
        let ctx = Context::new(
            environment,
            runner.clone(),
            Arc::new(registry),
            EngineConfig::default(),
        );

        Self {
            log,
            store,
            runner,
            provisioner,
            ctx,
        }
    }

    /// Persists a record as a previous run would have left it
    ///
    /// The owning deployment is the part of `name` before the first dash.
    pub async fn seed(&self, name: &str, features: &[&str], status: &str, provisioner: &str) {
        let deployment = name.split_once('-').map_or(name, |(deployment, _)| deployment);
        self.seed_in(deployment, name, features, status, provisioner)
            .await;
    }

    pub async fn seed_in(
        &self,
        deployment: &str,
        name: &str,
        features: &[&str],
        status: &str,
        provisioner: &str,
    ) {
        let mut record = NodeRecord::new(name).with_connection(&connection("10.1.1.1"));
        record.set_attribute(DEPLOYMENT_KEY, json!(deployment));
        record.run_list = vec!["role[seeded]".to_string()];
        record.set_attribute(
            "archive",
            json!({
                "features": features,
                "status": status,
                "provisioner": provisioner,
            }),
        );
        self.store.save(&record).await.unwrap();
    }
}
