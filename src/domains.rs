use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    NoState,
    Running,
    Blocked,
    Paused,
    ShuttingDown,
    ShutOff,
    Crashed,
    PmSuspended,
}

impl std::fmt::Display for DomainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DomainState::NoState => "NOSTATE",
            DomainState::Running => "RUNNING",
            DomainState::Blocked => "BLOCKED",
            DomainState::Paused => "PAUSED",
            DomainState::ShuttingDown => "SHUTDOWN",
            DomainState::ShutOff => "SHUTOFF",
            DomainState::Crashed => "CRASHED",
            DomainState::PmSuspended => "PMSUSPENDED",
        };
        f.write_str(name)
    }
}

/// One VM snapshot. Name and state are always present; address and OS
/// fields stay empty when no source could resolve them.
#[derive(Debug, Clone)]
pub struct DomainInfo {
    pub name: String,
    pub uuid: String,
    pub state: DomainState,
    pub disks: Vec<PathBuf>,
    pub address: Option<String>,
    pub os_id: Option<String>,
    pub os_version_id: Option<String>,
}

/// VMs whose disks intersect the managed pool's volumes.
pub fn managed<'a>(
    domains: &'a [DomainInfo],
    pool_volumes: &HashSet<PathBuf>,
) -> Vec<&'a DomainInfo> {
    domains
        .iter()
        .filter(|vm| vm.disks.iter().any(|disk| pool_volumes.contains(disk)))
        .collect()
}
