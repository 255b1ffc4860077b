use crate::client::RegistryClient;
use crate::consul::ConsulClient;
use crate::neighbour::Neighbour;
use crate::registration::{self, ServiceRegistration};
use crate::state::RegistrationState;
use crate::{RegistryError, TopologyError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use storefleet_schema::TopologySection;
use tracing::{debug, info, trace, warn};

struct Inner {
    state: RegistrationState,
    registration: Option<ServiceRegistration>,
    /// Set by a failed activation so the heartbeat keeps trying; cleared on
    /// shutdown.
    retry: bool,
}

/// Registration, heartbeat and discovery for one process.
///
/// Every state transition, including the self-heal sequence, happens while
/// holding a single lock so heartbeat and shutdown never interleave.
pub struct TopologyService {
    settings: TopologySection,
    client: Arc<dyn RegistryClient>,
    inner: Mutex<Inner>,
    read_only: bool,
}

impl TopologyService {
    pub fn new(settings: TopologySection, client: Arc<dyn RegistryClient>) -> Self {
        Self {
            settings,
            client,
            inner: Mutex::new(Inner {
                state: RegistrationState::Unregistered,
                registration: None,
                retry: false,
            }),
            read_only: false,
        }
    }

    /// Discovery without an identity of its own.
    ///
    /// A read-only service never registers, so short-lived processes sharing
    /// the configuration of a running instance cannot deregister it on exit.
    /// Discovery queries the registry directly.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Service backed by the Consul agent named in `settings`.
    pub fn consul(settings: TopologySection) -> Self {
        let client = Arc::new(ConsulClient::new(&settings.registry_url()));
        Self::new(settings, client)
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn instance_id(&self) -> String {
        registration::instance_id(&self.settings)
    }

    pub fn service_name(&self) -> String {
        registration::service_name(&self.settings)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.settings.heartbeat_secs.max(1))
    }

    pub fn state(&self) -> RegistrationState {
        self.inner
            .lock()
            .map(|i| i.state)
            .unwrap_or(RegistrationState::Unregistered)
    }

    pub fn is_registered(&self) -> bool {
        self.state() == RegistrationState::Registered
    }

    /// Registration currently advertised, if any attempt has been made.
    pub fn registration(&self) -> Option<ServiceRegistration> {
        self.inner.lock().ok().and_then(|i| i.registration.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, TopologyError> {
        self.inner.lock().map_err(|_| TopologyError::Poisoned)
    }

    /// Register this process and check in once.
    ///
    /// Registry failures are logged, not returned: the service stays
    /// unregistered and the heartbeat retries later.
    pub fn activate(&self) -> Result<RegistrationState, TopologyError> {
        if !self.settings.enabled {
            info!("topology service is disabled");
            return Ok(RegistrationState::Unregistered);
        }
        if self.read_only {
            debug!("read-only topology service, not registering");
            return Ok(RegistrationState::Unregistered);
        }
        let mut inner = self.lock()?;
        if inner.state == RegistrationState::Registered {
            return Ok(inner.state);
        }
        inner.retry = true;
        self.register_locked(&mut inner)
    }

    fn register_locked(&self, inner: &mut Inner) -> Result<RegistrationState, TopologyError> {
        inner.state = inner.state.transition(RegistrationState::Registering)?;
        let reg = ServiceRegistration::build(&self.settings);
        let outcome = self
            .client
            .register(&reg)
            .and_then(|()| self.client.pass(&reg.id));
        let id = reg.id.clone();
        inner.registration = Some(reg);
        match outcome {
            Ok(()) => {
                inner.state = inner.state.transition(RegistrationState::Registered)?;
                info!("instance registered with id={id}");
            }
            Err(e) => {
                inner.state = inner.state.transition(RegistrationState::Unregistered)?;
                warn!("unable to register topology instance {id}: {e}");
            }
        }
        Ok(inner.state)
    }

    /// One heartbeat tick. Never fails; problems are logged.
    pub fn heartbeat(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!("topology state lock poisoned, skipping heartbeat");
            return;
        };
        let state = inner.state;
        match state {
            RegistrationState::Registered => {
                let id = self.instance_id();
                match self.client.pass(&id) {
                    Ok(()) => trace!("checked in {id}"),
                    Err(RegistryError::NotRegistered(_)) => {
                        warn!("registry no longer knows {id}, re-registering");
                        self.self_heal(&mut inner, &id);
                    }
                    Err(e) => warn!("topology checkin failed: {e}"),
                }
            }
            RegistrationState::Unregistered if inner.retry => {
                debug!("retrying topology registration");
                if let Err(e) = self.register_locked(&mut inner) {
                    warn!("topology registration retry failed: {e}");
                }
            }
            _ => {}
        }
    }

    fn self_heal(&self, inner: &mut Inner, stale_id: &str) {
        if let Err(e) = self.client.deregister(stale_id) {
            debug!("deregistration of stale {stale_id} failed: {e}");
        }
        match self.register_locked(inner) {
            Ok(RegistrationState::Registered) => info!("self-heal re-registered {stale_id}"),
            Ok(state) => warn!("self-heal left {stale_id} {state}"),
            Err(e) => warn!("self-heal of {stale_id} failed: {e}"),
        }
    }

    /// Deregister if registered. Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<(), TopologyError> {
        let mut inner = self.lock()?;
        inner.retry = false;
        if inner.state != RegistrationState::Registered {
            return Ok(());
        }
        let id = self.instance_id();
        if let Err(e) = self.client.deregister(&id) {
            warn!("failed to deregister {id}: {e}");
        }
        inner.state = inner.state.transition(RegistrationState::Unregistered)?;
        info!("service instance unregistered for id={id}");
        Ok(())
    }

    /// Every instance of every service sharing this deployment's prefix.
    ///
    /// Empty while unregistered, unless the service is read-only. Each call
    /// queries the registry.
    pub fn list(&self) -> Result<Vec<Neighbour>, TopologyError> {
        if !self.read_only && !self.is_registered() {
            warn!("topology service is not registered, no neighbours to list");
            return Ok(Vec::new());
        }
        let prefix = self.settings.prefix.as_str();
        let mut neighbours = Vec::new();
        for name in self.client.services()? {
            if name.starts_with(prefix) {
                neighbours.extend(self.client.instances(&name)?);
            }
        }
        debug!("found {} neighbours", neighbours.len());
        Ok(neighbours)
    }

    /// Location of the store advertised as `<prefix><name>`.
    pub fn lookup(&self, name: &str) -> Result<Option<String>, TopologyError> {
        let wanted = format!("{}{name}", self.settings.prefix);
        Ok(self
            .list()?
            .into_iter()
            .find(|n| n.service_name == wanted)
            .map(|n| n.location()))
    }
}
