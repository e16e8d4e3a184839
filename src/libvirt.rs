//! Thin adapter over the libvirt connection. Every raw hypervisor call
//! lives here; the rest of the crate works on plain data.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use virt::connect::Connect;
use virt::error as virt_error;
use virt::sys;

use crate::domains::DomainState;
use crate::error::CorralError;
use crate::leases::NetworkLease;
use crate::pools::{self, PoolInfo};
use crate::resolve::GuestSource;

pub struct ConnGuard(Connect);

impl std::ops::Deref for ConnGuard {
    type Target = Connect;
    fn deref(&self) -> &Connect {
        &self.0
    }
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        self.0.close().ok();
    }
}

/// Open the primary connection. Unlike the lease connections, this one is
/// required: without it no correct result is possible.
pub fn connect(uri: Option<&str>) -> Result<ConnGuard, CorralError> {
    // Suppress libvirt's default handler that prints every error to stderr;
    // errors surface through Result values only.
    virt_error::clear_error_callback();

    Connect::open(uri)
        .map(ConnGuard)
        .map_err(|e| CorralError::Libvirt {
            message: format!("failed to connect to libvirt: {e}"),
            hint: format!(
                "ensure libvirtd is running and you have access to {}",
                uri.unwrap_or("the default URI")
            ),
        })
}

/// Static per-domain data pulled in one enumeration pass.
#[derive(Debug, Clone)]
pub struct RawDomain {
    pub name: String,
    pub uuid: String,
    pub state: DomainState,
    pub xml: String,
}

pub fn fetch_domains(conn: &Connect) -> Result<Vec<RawDomain>, CorralError> {
    let flags = sys::VIR_CONNECT_LIST_DOMAINS_ACTIVE | sys::VIR_CONNECT_LIST_DOMAINS_INACTIVE;
    let domains = conn
        .list_all_domains(flags)
        .map_err(|e| CorralError::Libvirt {
            message: format!("failed to list domains: {e}"),
            hint: "check libvirt permissions".into(),
        })?;

    let mut raw = Vec::new();
    for domain in domains {
        let Ok(name) = domain.get_name() else {
            continue;
        };
        let state = domain
            .get_state()
            .map(|(code, _reason)| state_from_code(code))
            .unwrap_or(DomainState::NoState);
        raw.push(RawDomain {
            name,
            uuid: domain.get_uuid_string().unwrap_or_default(),
            state,
            xml: domain.get_xml_desc(0).unwrap_or_default(),
        });
    }
    Ok(raw)
}

/// Current domain names, re-queried live (not from a memoized snapshot) so
/// `create` can re-verify its chosen name right before the irreversible
/// image creation step.
pub fn list_domain_names(conn: &Connect) -> Result<Vec<String>, CorralError> {
    let flags = sys::VIR_CONNECT_LIST_DOMAINS_ACTIVE | sys::VIR_CONNECT_LIST_DOMAINS_INACTIVE;
    let domains = conn
        .list_all_domains(flags)
        .map_err(|e| CorralError::Libvirt {
            message: format!("failed to list domains: {e}"),
            hint: "check libvirt permissions".into(),
        })?;
    Ok(domains
        .iter()
        .filter_map(|domain| domain.get_name().ok())
        .collect())
}

fn state_from_code(code: u32) -> DomainState {
    match code {
        sys::VIR_DOMAIN_RUNNING => DomainState::Running,
        sys::VIR_DOMAIN_BLOCKED => DomainState::Blocked,
        sys::VIR_DOMAIN_PAUSED => DomainState::Paused,
        sys::VIR_DOMAIN_SHUTDOWN => DomainState::ShuttingDown,
        sys::VIR_DOMAIN_SHUTOFF => DomainState::ShutOff,
        sys::VIR_DOMAIN_CRASHED => DomainState::Crashed,
        sys::VIR_DOMAIN_PMSUSPENDED => DomainState::PmSuspended,
        _ => DomainState::NoState,
    }
}

pub fn fetch_pools(conn: &Connect) -> Result<Vec<PoolInfo>, CorralError> {
    let found = conn
        .list_all_storage_pools(0)
        .map_err(|e| CorralError::Libvirt {
            message: format!("failed to list storage pools: {e}"),
            hint: "check libvirt permissions".into(),
        })?;

    let mut result = Vec::new();
    for pool in found {
        let Ok(name) = pool.get_name() else {
            continue;
        };
        let Ok(xml) = pool.get_xml_desc(0) else {
            continue;
        };
        // Pools without a target path (e.g. inactive remote pools) can't
        // hold managed images; skip them like any other unusable source.
        let Some(path) = pools::pool_path_from_xml(&xml) else {
            continue;
        };

        let volumes = pool
            .list_all_volumes(0)
            .map(|volumes| {
                volumes
                    .iter()
                    .filter_map(|volume| volume.get_path().ok())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        result.push(PoolInfo {
            name,
            uuid: pool.get_uuid_string().unwrap_or_default(),
            path,
            volumes: pools::filter_image_volumes(volumes),
        });
    }
    Ok(result)
}

/// DHCP leases of every network on one connection URI. None when the
/// connection cannot be opened; the caller treats that as an empty partial
/// result.
pub fn leases_for_uri(uri: &str) -> Option<Vec<NetworkLease>> {
    virt_error::clear_error_callback();
    let conn = Connect::open(Some(uri)).map(ConnGuard).ok()?;
    let networks = conn.list_all_networks(0).ok()?;

    let mut leases = Vec::new();
    for network in networks {
        let Ok(found) = network.get_dhcp_leases() else {
            continue;
        };
        for lease in found {
            leases.push(NetworkLease {
                mac: lease.mac.unwrap_or_default(),
                interface: lease.iface,
                client_id: lease.clientid.unwrap_or_default(),
                expiry_time: lease.expirytime,
                address: lease.ipaddr,
                prefix: lease.prefix,
                hostname: lease.hostname,
            });
        }
    }
    Some(leases)
}

/// Live guest-agent query for one domain, via `virsh guestinfo`; the
/// binding does not wrap `virDomainGetGuestInfo`. Any failure means "no
/// guest data", never an error.
pub fn guest_info(uri: Option<&str>, domain: &str) -> Option<BTreeMap<String, String>> {
    let mut cmd = Command::new("virsh");
    if let Some(uri) = uri {
        cmd.args(["-c", uri]);
    }
    cmd.args(["guestinfo", "--domain", domain]);

    let output = cmd.output().ok()?;
    if !output.status.success() {
        tracing::debug!(domain, "guest agent query failed");
        return None;
    }
    Some(parse_key_value_lines(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `virsh` `key : value` listing output into a flat map. Values may
/// themselves contain colons (IPv6 addresses); only the first separator
/// counts.
pub fn parse_key_value_lines(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// `GuestSource` backed by the live agent channel of one domain.
pub struct AgentQuery<'a> {
    pub uri: Option<&'a str>,
    pub domain: &'a str,
}

impl GuestSource for AgentQuery<'_> {
    fn live_data(&self) -> Option<BTreeMap<String, String>> {
        guest_info(self.uri, self.domain)
    }
}
