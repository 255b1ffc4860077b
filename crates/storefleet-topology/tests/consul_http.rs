//! `ConsulClient` and `TopologyService` against a fake Consul agent.
//!
//! The fake speaks just enough of the agent, catalog and health APIs over
//! real HTTP (tiny_http on a random port) to exercise the client end to end.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use storefleet_schema::{ServiceSection, TopologySection};
use storefleet_topology::{
    ConsulClient, RegistrationCheck, RegistrationState, RegistryClient, RegistryError,
    ServiceRegistration, TopologyService,
};
use tiny_http::{Method, Response, Server, StatusCode};

#[derive(Default)]
struct AgentState {
    services: BTreeMap<String, Value>,
    requests: Vec<String>,
    /// Answer TTL passes the way older agents do: 500 with a message.
    legacy_errors: bool,
}

struct FakeConsul {
    url: String,
    port: u16,
    state: Arc<Mutex<AgentState>>,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl FakeConsul {
    fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let state = Arc::new(Mutex::new(AgentState::default()));

        let srv = Arc::clone(&server);
        let st = Arc::clone(&state);
        let handle = std::thread::spawn(move || {
            for mut req in srv.incoming_requests() {
                let mut body = String::new();
                let _ = req.as_reader().read_to_string(&mut body);
                let (code, payload) = route(&st, req.method(), req.url(), &body);
                let _ = req.respond(Response::from_string(payload).with_status_code(StatusCode(code)));
            }
        });

        Self {
            url: format!("http://127.0.0.1:{port}"),
            port,
            state,
            server,
            handle: Some(handle),
        }
    }

    fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    fn evict(&self, id: &str) {
        self.state.lock().unwrap().services.remove(id);
    }

    fn seed(&self, id: &str, name: &str) {
        self.state.lock().unwrap().services.insert(
            id.to_owned(),
            json!({"ID": id, "Name": name, "Address": "", "Port": 8080, "Tags": null}),
        );
    }

    fn legacy_errors(&self) {
        self.state.lock().unwrap().legacy_errors = true;
    }
}

impl Drop for FakeConsul {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn route(state: &Mutex<AgentState>, method: &Method, url: &str, body: &str) -> (u16, String) {
    let mut st = state.lock().unwrap();
    st.requests.push(format!("{method} {url}"));

    if *method == Method::Put && url == "/v1/agent/service/register" {
        let Ok(reg) = serde_json::from_str::<Value>(body) else {
            return (400, "bad json".to_owned());
        };
        let id = reg["ID"].as_str().unwrap_or_default().to_owned();
        st.services.insert(id, reg);
        return (200, String::new());
    }
    if let Some(id) = url.strip_prefix("/v1/agent/service/deregister/") {
        return match st.services.remove(id) {
            Some(_) => (200, String::new()),
            None => (404, format!("Unknown service ID \"{id}\"")),
        };
    }
    if let Some(id) = url.strip_prefix("/v1/agent/check/pass/service:") {
        if st.services.contains_key(id) {
            return (200, String::new());
        }
        return if st.legacy_errors {
            (
                500,
                format!("CheckID \"service:{id}\" does not have associated TTL"),
            )
        } else {
            (404, format!("Unknown check ID \"service:{id}\""))
        };
    }
    if url == "/v1/catalog/services" {
        let mut names = serde_json::Map::new();
        for svc in st.services.values() {
            let name = svc["Name"].as_str().unwrap_or_default().to_owned();
            names.insert(name, json!([]));
        }
        return (200, Value::Object(names).to_string());
    }
    if let Some(name) = url.strip_prefix("/v1/health/service/") {
        let entries: Vec<Value> = st
            .services
            .values()
            .filter(|s| s["Name"] == name)
            .map(|s| {
                json!({
                    "Node": {"Node": "agent-1", "Address": "10.1.0.1"},
                    "Service": {
                        "ID": s["ID"], "Service": s["Name"], "Tags": s["Tags"],
                        "Address": s["Address"], "Port": s["Port"]
                    },
                    "Checks": []
                })
            })
            .collect();
        return (200, Value::Array(entries).to_string());
    }
    (404, "no route".to_owned())
}

fn settings(consul: &FakeConsul) -> TopologySection {
    TopologySection {
        enabled: true,
        host: "127.0.0.1".to_owned(),
        port: consul.port,
        https: false,
        prefix: "x.store.".to_owned(),
        heartbeat_secs: 10,
        service: ServiceSection {
            name: "a".to_owned(),
            host: "a.stores.example.org".to_owned(),
            port: 443,
            protocol: "https".to_owned(),
        },
    }
}

fn registration(id: &str, name: &str) -> ServiceRegistration {
    ServiceRegistration {
        id: id.to_owned(),
        name: name.to_owned(),
        address: "h".to_owned(),
        port: 80,
        tags: vec!["fqdn.http://h".to_owned()],
        check: RegistrationCheck::default(),
    }
}

#[test]
fn client_register_pass_deregister() {
    let consul = FakeConsul::start();
    let client = ConsulClient::new(&consul.url);

    client.register(&registration("s.1", "s")).unwrap();
    client.pass("s.1").unwrap();
    assert_eq!(client.services().unwrap(), vec!["s"]);
    let instances = client.instances("s").unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].fqdn.as_deref(), Some("http://h"));

    client.deregister("s.1").unwrap();
    assert!(matches!(
        client.pass("s.1"),
        Err(RegistryError::NotRegistered(ref id)) if id == "s.1"
    ));
}

#[test]
fn legacy_unknown_check_is_not_registered() {
    let consul = FakeConsul::start();
    consul.legacy_errors();
    let client = ConsulClient::new(&consul.url);
    assert!(matches!(
        client.pass("gone.1"),
        Err(RegistryError::NotRegistered(_))
    ));
}

#[test]
fn service_round_trip_over_http() {
    let consul = FakeConsul::start();
    consul.seed("x.store.b.1", "x.store.b");
    consul.seed("y.other.c.1", "y.other.c");
    let svc = TopologyService::consul(settings(&consul));

    assert_eq!(svc.activate().unwrap(), RegistrationState::Registered);
    let mut neighbours = svc.list().unwrap();
    neighbours.sort_by(|a, b| a.service_name.cmp(&b.service_name));
    assert_eq!(neighbours.len(), 2);
    assert_eq!(neighbours[0].service_name, "x.store.a");
    assert_eq!(
        neighbours[0].fqdn.as_deref(),
        Some("https://a.stores.example.org:443")
    );
    assert_eq!(neighbours[1].service_name, "x.store.b");
    assert_eq!(neighbours[1].address, "10.1.0.1");
    assert!(!consul
        .requests()
        .iter()
        .any(|r| r.contains("/v1/health/service/y.other.c")));

    svc.shutdown().unwrap();
    assert!(consul
        .requests()
        .iter()
        .any(|r| r == "PUT /v1/agent/service/deregister/x.store.a.1"));
}

#[test]
fn self_heal_over_http() {
    let consul = FakeConsul::start();
    let svc = TopologyService::consul(settings(&consul));
    svc.activate().unwrap();

    consul.evict("x.store.a.1");
    svc.heartbeat();
    assert!(svc.is_registered());

    let requests = consul.requests();
    let registers = requests
        .iter()
        .filter(|r| r.ends_with("/v1/agent/service/register"))
        .count();
    let deregisters = requests
        .iter()
        .filter(|r| r.contains("/v1/agent/service/deregister/"))
        .count();
    assert_eq!(registers, 2);
    assert_eq!(deregisters, 1);
}
