use std::fmt;
use std::process::Command;

/// A host tool storefleet shells out to, with install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Tools needed by the docker provider. Empty means everything is present.
pub fn check_docker_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists("docker") {
        missing.push(MissingPrereq {
            name: "docker",
            purpose: "talking to the container host",
            install_hint: "apt install docker.io | dnf install moby-engine | pacman -S docker (only the client is required)",
        });
    }
    missing
}

/// Tools needed by the dokku provider.
pub fn check_ssh_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists("ssh") {
        missing.push(MissingPrereq {
            name: "ssh",
            purpose: "running commands on the dokku host",
            install_hint: "apt install openssh-client | dnf install openssh-clients | pacman -S openssh",
        });
    }
    missing
}

pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nstorefleet drives these tools to provision stores.");
    msg
}
