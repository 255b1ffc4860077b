use crate::client::RegistryClient;
use crate::neighbour::{parse_health_entries, Neighbour};
use crate::registration::ServiceRegistration;
use crate::RegistryError;
use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Consul agent HTTP client.
///
/// Routes used:
/// - `PUT /v1/agent/service/register`
/// - `PUT /v1/agent/service/deregister/<id>`
/// - `PUT /v1/agent/check/pass/service:<id>`
/// - `GET /v1/catalog/services`
/// - `GET /v1/health/service/<name>`
pub struct ConsulClient {
    base_url: String,
    agent: ureq::Agent,
}

impl ConsulClient {
    pub fn new(base_url: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn read_response(resp: ureq::http::Response<ureq::Body>) -> Result<(u16, String), RegistryError> {
        let code = resp.status().as_u16();
        let mut body = String::new();
        resp.into_body()
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|e| RegistryError::Transport(e.to_string()))?;
        Ok((code, body))
    }

    fn put(&self, path: &str, json: Option<Vec<u8>>) -> Result<(u16, String), RegistryError> {
        let url = self.url(path);
        tracing::debug!("PUT {url}");
        let req = self.agent.put(&url);
        let resp = match json {
            Some(data) => req.header("Content-Type", "application/json").send(&data[..]),
            None => req.send_empty(),
        }
        .map_err(|e| RegistryError::Transport(e.to_string()))?;
        Self::read_response(resp)
    }

    fn get(&self, path: &str) -> Result<String, RegistryError> {
        let url = self.url(path);
        tracing::debug!("GET {url}");
        let resp = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| RegistryError::Transport(e.to_string()))?;
        match Self::read_response(resp)? {
            (200, body) => Ok(body),
            (status, body) => Err(RegistryError::Http { status, body }),
        }
    }
}

/// Consul answers an unknown TTL check with 404 on recent versions and a 500
/// carrying one of these messages on older ones.
fn is_unknown_check(status: u16, body: &str) -> bool {
    status == 404
        || (status == 500
            && (body.contains("Unknown check")
                || body.contains("does not have associated TTL")
                || body.contains("Unknown service")))
}

impl RegistryClient for ConsulClient {
    fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError> {
        let payload =
            serde_json::to_vec(registration).map_err(|e| RegistryError::Decode(e.to_string()))?;
        match self.put("/v1/agent/service/register", Some(payload))? {
            (200, _) => Ok(()),
            (status, body) => Err(RegistryError::Http { status, body }),
        }
    }

    fn deregister(&self, instance_id: &str) -> Result<(), RegistryError> {
        match self.put(&format!("/v1/agent/service/deregister/{instance_id}"), None)? {
            (200, _) => Ok(()),
            (status, body) if is_unknown_check(status, &body) => {
                Err(RegistryError::NotRegistered(instance_id.to_owned()))
            }
            (status, body) => Err(RegistryError::Http { status, body }),
        }
    }

    fn pass(&self, instance_id: &str) -> Result<(), RegistryError> {
        match self.put(&format!("/v1/agent/check/pass/service:{instance_id}"), None)? {
            (200, _) => Ok(()),
            (status, body) if is_unknown_check(status, &body) => {
                Err(RegistryError::NotRegistered(instance_id.to_owned()))
            }
            (status, body) => Err(RegistryError::Http { status, body }),
        }
    }

    fn services(&self) -> Result<Vec<String>, RegistryError> {
        let body = self.get("/v1/catalog/services")?;
        let services: BTreeMap<String, Option<Vec<String>>> =
            serde_json::from_str(&body).map_err(|e| RegistryError::Decode(e.to_string()))?;
        Ok(services.into_keys().collect())
    }

    fn instances(&self, service_name: &str) -> Result<Vec<Neighbour>, RegistryError> {
        let body = self.get(&format!("/v1/health/service/{service_name}"))?;
        parse_health_entries(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = ConsulClient::new("http://consul:8500/");
        assert_eq!(c.base_url(), "http://consul:8500");
        assert_eq!(
            c.url("/v1/catalog/services"),
            "http://consul:8500/v1/catalog/services"
        );
    }

    #[test]
    fn unknown_check_detection() {
        assert!(is_unknown_check(404, ""));
        assert!(is_unknown_check(
            500,
            "CheckID \"service:x\" does not have associated TTL"
        ));
        assert!(is_unknown_check(500, "Unknown check ID \"service:x\""));
        assert!(!is_unknown_check(500, "rpc error"));
        assert!(!is_unknown_check(403, "ACL not found"));
    }

    #[test]
    fn unreachable_agent_is_transport_error() {
        let c = ConsulClient::new("http://127.0.0.1:1");
        assert!(matches!(c.pass("x"), Err(RegistryError::Transport(_))));
    }
}
