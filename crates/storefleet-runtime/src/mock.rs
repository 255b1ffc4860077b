use crate::backend::ContainerRuntime;
use crate::probe::{ContainerDetails, ContainerSummary, NetworkInfo, ResourceProbe, VolumeInfo};
use crate::spec::{ContainerSpec, VolumeSpec};
use crate::RuntimeError;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Operations of [`MockRuntime`] that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    FindNetwork,
    FindVolume,
    ListContainers,
    Inspect,
    CreateVolume,
    CreateContainer,
    ConnectNetwork,
    StartContainer,
}

#[derive(Debug, Clone)]
struct MockContainer {
    details: ContainerDetails,
    running: bool,
    networks: Vec<String>,
}

#[derive(Default)]
struct MockState {
    networks: BTreeMap<String, String>,
    volumes: BTreeMap<String, VolumeSpec>,
    containers: Vec<MockContainer>,
    next_id: u64,
    calls: Vec<String>,
    failures: HashSet<MockOp>,
}

/// In-memory container runtime with docker-like name uniqueness.
///
/// Records every call so tests can assert on exactly what a pipeline did.
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_network(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            let id = format!("net-{name}");
            state.networks.insert(name.to_owned(), id);
        }
        self
    }

    /// Make every future call of `op` fail with [`RuntimeError::ExecFailed`].
    pub fn fail_on(&self, op: MockOp) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.insert(op);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.clear();
        }
    }

    /// Seed an existing container, e.g. one that has drifted.
    pub fn insert_container(&self, details: ContainerDetails) {
        if let Ok(mut state) = self.state.lock() {
            state.containers.push(MockContainer {
                details,
                running: false,
                networks: Vec::new(),
            });
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.volumes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().map(|s| s.containers.len()).unwrap_or(0)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state
            .lock()
            .map(|s| {
                s.containers
                    .iter()
                    .any(|c| c.details.name == name && c.running)
            })
            .unwrap_or(false)
    }

    pub fn container_networks(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| {
                s.containers
                    .iter()
                    .find(|c| c.details.name == name)
                    .map(|c| c.networks.clone())
            })
            .unwrap_or_default()
    }

    fn enter(&self, op: MockOp, call: String) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?;
        state.calls.push(call);
        if state.failures.contains(&op) {
            return Err(RuntimeError::ExecFailed(format!("injected failure: {op:?}")));
        }
        Ok(state)
    }
}

impl ResourceProbe for MockRuntime {
    fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>, RuntimeError> {
        let state = self.enter(MockOp::FindNetwork, format!("find_network {name}"))?;
        Ok(state.networks.get(name).map(|id| NetworkInfo {
            id: id.clone(),
            name: name.to_owned(),
        }))
    }

    fn find_volume(&self, name: &str) -> Result<Option<VolumeInfo>, RuntimeError> {
        let state = self.enter(MockOp::FindVolume, format!("find_volume {name}"))?;
        Ok(state.volumes.get(name).map(|v| VolumeInfo {
            name: v.name.clone(),
            driver: "local".to_owned(),
        }))
    }

    fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let state = self.enter(MockOp::ListContainers, "list_containers".to_owned())?;
        Ok(state
            .containers
            .iter()
            .map(|c| ContainerSummary {
                id: c.details.id.clone(),
                names: vec![format!("/{}", c.details.name)],
                image: c.details.image.clone(),
                running: c.running,
            })
            .collect())
    }

    fn inspect_container(&self, id: &str) -> Result<ContainerDetails, RuntimeError> {
        let state = self.enter(MockOp::Inspect, format!("inspect {id}"))?;
        state
            .containers
            .iter()
            .find(|c| c.details.id == id)
            .map(|c| c.details.clone())
            .ok_or_else(|| RuntimeError::NotFound(id.to_owned()))
    }
}

impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeInfo, RuntimeError> {
        let mut state = self.enter(MockOp::CreateVolume, format!("create_volume {}", spec.name))?;
        if state.volumes.contains_key(&spec.name) {
            return Err(RuntimeError::Conflict(spec.name.clone()));
        }
        state.volumes.insert(spec.name.clone(), spec.clone());
        Ok(VolumeInfo {
            name: spec.name.clone(),
            driver: "local".to_owned(),
        })
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.enter(
            MockOp::CreateContainer,
            format!("create_container {}", spec.name),
        )?;
        if state.containers.iter().any(|c| c.details.name == spec.name) {
            return Err(RuntimeError::Conflict(format!(
                "the container name \"/{}\" is already in use",
                spec.name
            )));
        }
        state.next_id += 1;
        let id = format!("mock-{:04}", state.next_id);
        let details = ContainerDetails {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            hostname: spec.hostname.clone(),
            env: spec.env.iter().cloned().collect(),
            labels: spec.labels.clone(),
            network_mode: spec
                .network_mode
                .clone()
                .unwrap_or_else(|| "default".to_owned()),
            binds: vec![spec.bind.to_string()],
        };
        state.containers.push(MockContainer {
            details,
            running: false,
            networks: Vec::new(),
        });
        Ok(id)
    }

    fn connect_network(&self, network_id: &str, container_id: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter(
            MockOp::ConnectNetwork,
            format!("connect_network {network_id} {container_id}"),
        )?;
        if !state.networks.values().any(|id| id == network_id) {
            return Err(RuntimeError::NotFound(network_id.to_owned()));
        }
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.details.id == container_id)
            .ok_or_else(|| RuntimeError::NotFound(container_id.to_owned()))?;
        container.networks.push(network_id.to_owned());
        Ok(())
    }

    fn start_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        let mut state = self.enter(
            MockOp::StartContainer,
            format!("start_container {container_id}"),
        )?;
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.details.id == container_id)
            .ok_or_else(|| RuntimeError::NotFound(container_id.to_owned()))?;
        container.running = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::VolumeBind;
    use std::path::PathBuf;

    #[test]
    fn container_lifecycle() {
        let rt = MockRuntime::new().with_network("net");
        let spec = ContainerSpec::new("c1", "img", VolumeBind::new("v", "/data"));
        let id = rt.create_container(&spec).unwrap();
        assert!(!rt.is_running("c1"));

        let net = rt.find_network("net").unwrap().unwrap();
        rt.connect_network(&net.id, &id).unwrap();
        rt.start_container(&id).unwrap();
        assert!(rt.is_running("c1"));
        assert_eq!(rt.container_networks("c1"), vec![net.id]);

        let found = rt.find_container("c1").unwrap().unwrap();
        assert_eq!(found.id, id);
        let details = rt.inspect_container(&id).unwrap();
        assert_eq!(details.binds, vec!["v:/data"]);
    }

    #[test]
    fn duplicate_container_name_conflicts() {
        let rt = MockRuntime::new();
        let spec = ContainerSpec::new("c1", "img", VolumeBind::new("v", "/data"));
        rt.create_container(&spec).unwrap();
        assert!(matches!(
            rt.create_container(&spec),
            Err(RuntimeError::Conflict(_))
        ));
        assert_eq!(rt.container_count(), 1);
    }

    #[test]
    fn injected_failures_are_recorded() {
        let rt = MockRuntime::new();
        rt.fail_on(MockOp::CreateVolume);
        let spec = VolumeSpec {
            name: "v".to_owned(),
            host_path: PathBuf::from("/tmp/v"),
        };
        assert!(rt.create_volume(&spec).is_err());
        assert_eq!(rt.calls(), vec!["create_volume v"]);
        rt.clear_failures();
        assert!(rt.create_volume(&spec).is_ok());
        assert_eq!(rt.volume_names(), vec!["v"]);
    }

    #[test]
    fn unknown_network_is_absent() {
        let rt = MockRuntime::new();
        assert!(rt.find_network("nope").unwrap().is_none());
    }
}
