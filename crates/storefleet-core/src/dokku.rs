//! Remote-command pipeline against a dokku host.
//!
//! Provisioning is a fixed, ordered batch of dokku commands run over one
//! [`RemoteChannel`]. The batch stops at the first non-zero exit and reports
//! everything the host printed up to that point.

use crate::provider::{InstanceSummary, LogStep, ProvisioningReport, StoreProvider, StoreRequest};
use crate::ProviderError;
use std::sync::Arc;
use std::time::Duration;
use storefleet_remote::{CancelToken, RemoteChannel, RemoteError, SshChannel, SshConfig};
use storefleet_schema::{derive_password, DokkuSection, FleetConfig, ProvisioningLog};
use tracing::{debug, error, info};

const BANNER_PREFIX: &str = "=====>";
const STORAGE_ROOT: &str = "/var/lib/dokku/data/storage";
const FILESTORE_HOME: &str = "/opt/jboss/filestore";
const REGISTRY_PORT: u16 = 8500;
const DB_PORT: u16 = 5432;

pub struct DokkuProvider {
    settings: DokkuSection,
    channel: Arc<dyn RemoteChannel>,
}

impl DokkuProvider {
    pub fn new(settings: DokkuSection, channel: Arc<dyn RemoteChannel>) -> Self {
        Self { settings, channel }
    }

    /// Load the identity and known-hosts once and keep the channel for the
    /// lifetime of the provider.
    pub fn from_config(config: &FleetConfig) -> Result<Box<dyn StoreProvider>, ProviderError> {
        let settings = config.dokku()?.clone();
        let ssh = SshConfig::new(
            &settings.host,
            &settings.user,
            &settings.identity,
            &settings.known_hosts,
        )
        .with_port(settings.port)
        .with_timeout(settings.timeout_secs.map(Duration::from_secs))
        .with_poll_interval(Duration::from_millis(settings.poll_interval_ms));

        let channel = SshChannel::open(ssh).map_err(|e| match e {
            RemoteError::Config(msg) => ProviderError::Config(msg),
            other => ProviderError::Remote(other),
        })?;
        info!("dokku provider using {}", channel.destination());
        Ok(Box::new(Self::new(settings, Arc::new(channel))))
    }

    /// The provisioning batch for one store, in execution order.
    pub fn commands(&self, request: &StoreRequest) -> Vec<String> {
        let owner = request.owner.as_str();
        let host = self.settings.host.as_str();
        let password = derive_password(&request.id);
        let db = format!("{owner}-db");
        let data = format!("{owner}-data");

        let optional = [
            ("WILDFLY_ADMIN_PASSWORD", &self.settings.admin_password),
            ("OIDC_PROVIDER_URL", &self.settings.oidc_provider_url),
            ("OIDC_CLIENT_ID", &self.settings.oidc_client_id),
        ];
        let config = optional
            .into_iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| format!("{key}={v}")))
            .chain([
            "DB_USER=postgres".to_owned(),
            format!("DB_PASS={password}"),
            format!("DB_HOST=dokku-postgres-{db}"),
            format!("DB_PORT={DB_PORT}"),
            format!("DB_NAME={owner}_db"),
            format!("FILESTORE_HOME={FILESTORE_HOME}"),
            format!("FILESTORE_CONSUL_HOST=registry.{host}"),
            format!("FILESTORE_CONSUL_PORT={REGISTRY_PORT}"),
            format!("FILESTORE_OWNER={owner}"),
            format!("FILESTORE_NAME={}", request.name),
            format!("FILESTORE_ID={}", request.id),
            format!("FILESTORE_FQDN={owner}.{host}"),
        ])
        .collect::<Vec<_>>()
        .join(" ");

        vec![
            format!("apps:create {owner}"),
            format!("postgres:create {db} --password {password}"),
            format!("postgres:link {db} {owner}"),
            format!("storage:ensure-directory --chown heroku {data}"),
            format!("storage:mount {owner} {STORAGE_ROOT}/{data}:{FILESTORE_HOME}"),
            format!("config:set {owner} {config}"),
            format!("ports:add {owner} http:80:8080"),
            format!("git:from-image {owner} {}", self.settings.image),
        ]
    }
}

impl DokkuProvider {
    /// Provision like [`StoreProvider::create_instance`], stopping as soon as
    /// `cancel` fires. Each call takes its own token.
    pub fn create_cancellable(
        &self,
        request: &StoreRequest,
        cancel: &CancelToken,
    ) -> ProvisioningReport {
        info!(
            "creating dokku app for {} on {}",
            request.owner,
            self.channel.destination()
        );
        let commands = self.commands(request);
        let mut log = ProvisioningLog::new(commands.len());
        let result = run_batch(&*self.channel, &commands, cancel, &mut log).map(|output| {
            debug!("dokku output:\n{output}");
            request.id.to_string()
        });
        ProvisioningReport { log, result }
    }
}

/// Run `commands` in order, one log step each.
///
/// Returns the combined output of every command on success. The first
/// non-zero exit stops the batch; the error carries the output of all
/// commands executed so far, the failing one included. Cancelling `cancel`
/// aborts the running command and skips the rest.
pub fn run_batch(
    channel: &dyn RemoteChannel,
    commands: &[String],
    cancel: &CancelToken,
    log: &mut ProvisioningLog,
) -> Result<String, ProviderError> {
    let mut combined = String::new();
    for (i, command) in commands.iter().enumerate() {
        let index = i + 1;
        debug!("[{}] {command}", channel.destination());
        let out = channel
            .execute_with(command, cancel)
            .step(log, index, &format!("Failed to run `{command}`"))?;
        combined.push_str(&out.output);

        if !out.success() {
            error!("`{command}` exited with status {}", out.status);
            let reason = combined.trim_end();
            log.failed(
                index,
                if reason.is_empty() {
                    format!("`{command}` exited with status {}", out.status)
                } else {
                    format!("`{command}` exited with status {}: {reason}", out.status)
                },
            );
            return Err(ProviderError::RemoteCommand {
                command: command.clone(),
                status: out.status,
                output: combined,
            });
        }
        log.completed(index, format!("Executed: {command}"));
    }
    Ok(combined)
}

impl StoreProvider for DokkuProvider {
    fn name(&self) -> &str {
        "dokku"
    }

    fn list_instances(&self) -> Result<Vec<InstanceSummary>, ProviderError> {
        let command = "apps:list";
        let out = self.channel.execute(command)?;
        if !out.success() {
            return Err(ProviderError::RemoteCommand {
                command: command.to_owned(),
                status: out.status,
                output: out.output,
            });
        }
        Ok(out
            .output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with(BANNER_PREFIX))
            .map(|l| InstanceSummary {
                name: l.to_owned(),
                image: None,
            })
            .collect())
    }

    fn create_instance(&self, request: &StoreRequest) -> ProvisioningReport {
        self.create_cancellable(request, &CancelToken::new())
    }

    fn destroy_instance(&self, id: &str) -> Result<ProvisioningLog, ProviderError> {
        info!("destroying dokku app {id}");
        let mut log = ProvisioningLog::new(1);
        run_batch(
            &*self.channel,
            &[format!("--force apps:destroy {id}")],
            &CancelToken::new(),
            &mut log,
        )?;
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use storefleet_remote::ScriptedChannel;

    fn settings() -> DokkuSection {
        DokkuSection {
            host: "mbyte.fr".to_owned(),
            port: 22,
            user: "dokku".to_owned(),
            image: "jerome/filestore:25.1".to_owned(),
            identity: PathBuf::from("/nonexistent/id"),
            known_hosts: PathBuf::from("/nonexistent/known_hosts"),
            timeout_secs: None,
            poll_interval_ms: 1000,
            admin_password: None,
            oidc_provider_url: None,
            oidc_client_id: None,
        }
    }

    fn provider(channel: ScriptedChannel) -> (DokkuProvider, Arc<ScriptedChannel>) {
        let channel = Arc::new(channel);
        (DokkuProvider::new(settings(), channel.clone()), channel)
    }

    #[test]
    fn batch_order_and_content() {
        let (p, _) = provider(ScriptedChannel::new());
        let cmds = p.commands(&StoreRequest::new("id-1", "alice", "docs"));
        assert_eq!(cmds.len(), 8);
        assert_eq!(cmds[0], "apps:create alice");
        assert!(cmds[1].starts_with("postgres:create alice-db --password "));
        assert_eq!(cmds[2], "postgres:link alice-db alice");
        assert_eq!(
            cmds[4],
            "storage:mount alice /var/lib/dokku/data/storage/alice-data:/opt/jboss/filestore"
        );
        assert!(cmds[5].contains("FILESTORE_FQDN=alice.mbyte.fr"));
        assert!(cmds[5].contains("FILESTORE_ID=id-1"));
        assert!(cmds[5].contains("FILESTORE_CONSUL_HOST=registry.mbyte.fr"));
        assert_eq!(cmds[7], "git:from-image alice jerome/filestore:25.1");
    }

    #[test]
    fn optional_app_settings_are_pushed_first() {
        let mut s = settings();
        s.admin_password = Some("filestore".to_owned());
        s.oidc_client_id = Some("filestore".to_owned());
        let p = DokkuProvider::new(s, Arc::new(ScriptedChannel::new()));
        let cmds = p.commands(&StoreRequest::new("id-1", "alice", "docs"));
        assert!(cmds[5].starts_with(
            "config:set alice WILDFLY_ADMIN_PASSWORD=filestore OIDC_CLIENT_ID=filestore DB_USER=postgres"
        ));
        assert!(!cmds[5].contains("OIDC_PROVIDER_URL"));
    }

    #[test]
    fn unset_app_settings_are_omitted() {
        let (p, _) = provider(ScriptedChannel::new());
        let cmds = p.commands(&StoreRequest::new("id-1", "alice", "docs"));
        assert!(cmds[5].starts_with("config:set alice DB_USER=postgres "));
    }

    #[test]
    fn failed_step_carries_remote_output() {
        let (p, _) = provider(ScriptedChannel::new().fail_when(
            "postgres:link",
            1,
            "! Postgres service alice-db does not exist",
        ));
        let report = p.create_instance(&StoreRequest::new("id-1", "alice", "docs"));
        let last = report.log.last().unwrap();
        assert!(last.message.starts_with("`postgres:link alice-db alice` exited with status 1: "));
        assert!(last.message.ends_with("does not exist"));
    }

    #[test]
    fn password_is_shared_by_db_and_config() {
        let (p, _) = provider(ScriptedChannel::new());
        let cmds = p.commands(&StoreRequest::new("id-1", "alice", "docs"));
        let pw = derive_password("id-1");
        assert!(cmds[1].ends_with(&pw));
        assert!(cmds[5].contains(&format!("DB_PASS={pw}")));
    }

    #[test]
    fn create_logs_every_command() {
        let (p, channel) = provider(ScriptedChannel::new());
        let report = p.create_instance(&StoreRequest::new("id-1", "alice", "docs"));
        assert_eq!(report.result.unwrap(), "id-1");
        assert_eq!(report.log.entries().len(), 8);
        assert!(!report.log.has_failure());
        assert_eq!(channel.executed().len(), 8);
    }

    #[test]
    fn list_drops_banner_lines() {
        let (p, _) = provider(
            ScriptedChannel::new().respond(0, "=====> My Apps\nalice\n\nbob\n"),
        );
        let names: Vec<String> = p
            .list_instances()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn list_failure_is_error() {
        let (p, _) = provider(ScriptedChannel::new().respond(1, "permission denied"));
        assert!(matches!(
            p.list_instances(),
            Err(ProviderError::RemoteCommand { status: 1, .. })
        ));
    }

    #[test]
    fn destroy_is_forced() {
        let (p, channel) = provider(ScriptedChannel::new());
        let log = p.destroy_instance("alice").unwrap();
        assert_eq!(channel.executed(), vec!["--force apps:destroy alice"]);
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn cancelled_create_stops_before_first_command() {
        let (p, channel) = provider(ScriptedChannel::new());
        let token = CancelToken::new();
        token.cancel();
        let report = p.create_cancellable(&StoreRequest::new("id-1", "alice", "docs"), &token);
        assert!(matches!(
            report.result,
            Err(ProviderError::Remote(RemoteError::Cancelled { .. }))
        ));
        assert!(channel.executed().is_empty());
        assert_eq!(report.log.entries().len(), 1);

        let again = p.create_instance(&StoreRequest::new("id-1", "alice", "docs"));
        assert!(again.result.is_ok());
    }

    #[test]
    fn transport_failure_is_logged() {
        let (p, _) = provider(ScriptedChannel::new().unreachable());
        let report = p.create_instance(&StoreRequest::new("id-1", "alice", "docs"));
        assert!(matches!(report.result, Err(ProviderError::Remote(_))));
        assert_eq!(report.log.entries().len(), 1);
        assert!(report.log.has_failure());
    }
}
