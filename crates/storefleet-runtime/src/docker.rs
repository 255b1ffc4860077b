use crate::backend::ContainerRuntime;
use crate::probe::{ContainerDetails, ContainerSummary, NetworkInfo, ResourceProbe, VolumeInfo};
use crate::spec::{ContainerSpec, VolumeSpec};
use crate::RuntimeError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Command;
use tracing::debug;

const JSON_FORMAT: &str = "{{json .}}";

/// Docker engine driven through the `docker` client binary.
///
/// Every call is one client invocation against `endpoint` (anything the
/// client accepts as `--host`). Listings are requested as JSON lines and
/// filtered client-side for exact name matches.
pub struct DockerCli {
    binary: String,
    endpoint: String,
}

impl DockerCli {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            binary: "docker".to_owned(),
            endpoint: endpoint.into(),
        }
    }

    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if !self.endpoint.is_empty() {
            cmd.arg("--host").arg(&self.endpoint);
        }
        cmd
    }

    fn run(&self, args: &[String]) -> Result<String, RuntimeError> {
        let rendered = args.join(" ");
        debug!("docker {rendered}");
        let output = self.command().args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RuntimeError::Unavailable(self.binary.clone())
            } else {
                RuntimeError::Io(e)
            }
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            if stderr.contains("is already in use") {
                return Err(RuntimeError::Conflict(stderr));
            }
            return Err(RuntimeError::CommandFailed {
                command: format!("docker {rendered}"),
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[derive(Debug, Deserialize)]
struct NetworkRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct VolumeRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Driver", default)]
    driver: String,
}

#[derive(Debug, Deserialize)]
struct ContainerRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: String,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    env: Option<Vec<String>>,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHostConfig {
    #[serde(default)]
    network_mode: String,
    #[serde(default)]
    binds: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
    id: String,
    name: String,
    config: InspectConfig,
    host_config: InspectHostConfig,
}

/// Parse `{{json .}}` listing output: one JSON object per line.
fn parse_json_lines<T: for<'de> Deserialize<'de>>(output: &str) -> Result<Vec<T>, RuntimeError> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str(l).map_err(|e| RuntimeError::Parse(format!("{e}: {l}"))))
        .collect()
}

fn parse_containers(output: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
    let rows: Vec<ContainerRow> = parse_json_lines(output)?;
    Ok(rows
        .into_iter()
        .map(|row| ContainerSummary {
            id: row.id,
            names: row.names.split(',').map(str::to_owned).collect(),
            image: row.image,
            running: row.state == "running",
        })
        .collect())
}

fn parse_inspect(output: &str) -> Result<ContainerDetails, RuntimeError> {
    let mut records: Vec<InspectRecord> =
        serde_json::from_str(output).map_err(|e| RuntimeError::Parse(e.to_string()))?;
    if records.is_empty() {
        return Err(RuntimeError::NotFound("empty inspect result".to_owned()));
    }
    let record = records.swap_remove(0);
    Ok(ContainerDetails {
        id: record.id,
        name: record
            .name
            .strip_prefix('/')
            .unwrap_or(&record.name)
            .to_owned(),
        image: record.config.image,
        hostname: record.config.hostname,
        env: record.config.env.unwrap_or_default(),
        labels: record.config.labels.unwrap_or_default(),
        network_mode: record.host_config.network_mode,
        binds: record.host_config.binds.unwrap_or_default(),
    })
}

fn create_container_args(spec: &ContainerSpec) -> Vec<String> {
    let mut out = args(&["create", "--name", &spec.name, "--hostname", &spec.hostname]);
    for entry in &spec.env {
        out.push("--env".to_owned());
        out.push(entry.clone());
    }
    for (k, v) in &spec.labels {
        out.push("--label".to_owned());
        out.push(format!("{k}={v}"));
    }
    if let Some(mode) = &spec.network_mode {
        out.push("--network".to_owned());
        out.push(mode.clone());
    }
    out.push("--volume".to_owned());
    out.push(spec.bind.to_string());
    out.push(spec.image.clone());
    out
}

fn create_volume_args(spec: &VolumeSpec) -> Vec<String> {
    let device = format!("device={}", spec.host_path.display());
    args(&[
        "volume", "create", "--driver", "local", "--opt", "type=none", "--opt", "o=bind", "--opt",
        &device, &spec.name,
    ])
}

impl ResourceProbe for DockerCli {
    fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>, RuntimeError> {
        let filter = format!("name={name}");
        let out = self.run(&args(&["network", "ls", "--no-trunc", "--filter", &filter, "--format", JSON_FORMAT]))?;
        let rows: Vec<NetworkRow> = parse_json_lines(&out)?;
        Ok(rows
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| NetworkInfo {
                id: r.id,
                name: r.name,
            }))
    }

    fn find_volume(&self, name: &str) -> Result<Option<VolumeInfo>, RuntimeError> {
        let out = self.run(&args(&["volume", "ls", "--format", JSON_FORMAT]))?;
        let rows: Vec<VolumeRow> = parse_json_lines(&out)?;
        Ok(rows
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| VolumeInfo {
                name: r.name,
                driver: r.driver,
            }))
    }

    fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let out = self.run(&args(&["ps", "--all", "--no-trunc", "--format", JSON_FORMAT]))?;
        parse_containers(&out)
    }

    fn inspect_container(&self, id: &str) -> Result<ContainerDetails, RuntimeError> {
        let out = self.run(&args(&["inspect", "--type", "container", id]))?;
        parse_inspect(&out)
    }
}

impl ContainerRuntime for DockerCli {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn available(&self) -> bool {
        self.command()
            .arg("version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeInfo, RuntimeError> {
        let name = self.run(&create_volume_args(spec))?;
        Ok(VolumeInfo {
            name,
            driver: "local".to_owned(),
        })
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let id = self.run(&create_container_args(spec))?;
        if id.is_empty() {
            return Err(RuntimeError::Parse(format!(
                "no container id returned for '{}'",
                spec.name
            )));
        }
        Ok(id)
    }

    fn connect_network(&self, network_id: &str, container_id: &str) -> Result<(), RuntimeError> {
        self.run(&args(&["network", "connect", network_id, container_id]))?;
        Ok(())
    }

    fn start_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.run(&args(&["start", container_id]))?;
        Ok(())
    }
}
