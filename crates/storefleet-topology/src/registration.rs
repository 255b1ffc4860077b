use serde::{Deserialize, Serialize};
use storefleet_schema::TopologySection;

pub const CHECK_TTL: &str = "30s";
pub const DEREGISTER_CRITICAL_AFTER: &str = "1h";
pub const FQDN_TAG_PREFIX: &str = "fqdn.";

/// TTL check attached to a registration. Field names follow the Consul
/// agent API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCheck {
    #[serde(rename = "TTL")]
    pub ttl: String,
    #[serde(rename = "DeregisterCriticalServiceAfter")]
    pub deregister_critical_service_after: String,
}

impl Default for RegistrationCheck {
    fn default() -> Self {
        Self {
            ttl: CHECK_TTL.to_owned(),
            deregister_critical_service_after: DEREGISTER_CRITICAL_AFTER.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    #[serde(rename = "Check")]
    pub check: RegistrationCheck,
}

impl ServiceRegistration {
    /// Build the registration advertised by this process. Calling it twice
    /// with the same settings yields identical records.
    pub fn build(settings: &TopologySection) -> Self {
        let service = &settings.service;
        Self {
            id: instance_id(settings),
            name: service_name(settings),
            address: service.host.clone(),
            port: service.port,
            tags: vec![fqdn_tag(&service.protocol, &service.host, service.port)],
            check: RegistrationCheck::default(),
        }
    }

    /// Endpoint advertised through the `fqdn.` tag, if any.
    pub fn fqdn(&self) -> Option<&str> {
        fqdn_from_tags(&self.tags)
    }
}

pub fn service_name(settings: &TopologySection) -> String {
    format!("{}{}", settings.prefix, settings.service.name)
}

pub fn instance_id(settings: &TopologySection) -> String {
    format!("{}.1", service_name(settings))
}

/// `fqdn.<protocol>://<host>`, with `:<port>` unless the port is 80.
pub fn fqdn_tag(protocol: &str, host: &str, port: u16) -> String {
    if port == 80 {
        format!("{FQDN_TAG_PREFIX}{protocol}://{host}")
    } else {
        format!("{FQDN_TAG_PREFIX}{protocol}://{host}:{port}")
    }
}

pub fn fqdn_from_tags(tags: &[String]) -> Option<&str> {
    tags.iter().find_map(|t| t.strip_prefix(FQDN_TAG_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(port: u16) -> TopologySection {
        let mut s = TopologySection::default();
        s.enabled = true;
        s.service.name = "alice".to_owned();
        s.service.host = "alice.stores.mbyte.fr".to_owned();
        s.service.port = port;
        s
    }

    #[test]
    fn ids_derive_from_prefix_and_name() {
        let reg = ServiceRegistration::build(&settings(80));
        assert_eq!(reg.name, "mbyte.store.alice");
        assert_eq!(reg.id, "mbyte.store.alice.1");
        assert_eq!(reg.address, "alice.stores.mbyte.fr");
        assert_eq!(reg.check.ttl, "30s");
        assert_eq!(reg.check.deregister_critical_service_after, "1h");
    }

    #[test]
    fn fqdn_tag_omits_default_port() {
        let reg = ServiceRegistration::build(&settings(80));
        assert_eq!(reg.tags, vec!["fqdn.http://alice.stores.mbyte.fr"]);
        assert_eq!(reg.fqdn(), Some("http://alice.stores.mbyte.fr"));

        let reg = ServiceRegistration::build(&settings(8080));
        assert_eq!(reg.tags, vec!["fqdn.http://alice.stores.mbyte.fr:8080"]);
    }

    #[test]
    fn rebuild_is_identical() {
        let s = settings(80);
        assert_eq!(ServiceRegistration::build(&s), ServiceRegistration::build(&s));
    }

    #[test]
    fn serializes_consul_field_names() {
        let json = serde_json::to_value(ServiceRegistration::build(&settings(80))).unwrap();
        assert_eq!(json["ID"], "mbyte.store.alice.1");
        assert_eq!(json["Name"], "mbyte.store.alice");
        assert_eq!(json["Check"]["TTL"], "30s");
        assert_eq!(json["Check"]["DeregisterCriticalServiceAfter"], "1h");
    }
}
