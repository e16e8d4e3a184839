//! Per-VM address and OS resolution.
//!
//! Exactly one source family feeds a VM's snapshot: live guest-agent data
//! when the agent channel is connected and answers, otherwise static
//! metadata plus DHCP lease correlation. The two are never mixed, so a
//! snapshot can't end up with a guest-reported OS next to a lease-derived
//! address from a stale interface.

use std::collections::BTreeMap;

use crate::domain_xml::DomainDescription;
use crate::guest;
use crate::leases::{self, LeaseSource};

/// Live guest data seam. Returns the flattened agent key/value map, or
/// None when the agent cannot be reached.
pub trait GuestSource {
    fn live_data(&self) -> Option<BTreeMap<String, String>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub address: Option<String>,
    pub os_id: Option<String>,
    pub os_version_id: Option<String>,
}

pub fn resolve(
    desc: &DomainDescription,
    guest_source: &dyn GuestSource,
    lease_source: &dyn LeaseSource,
) -> Resolution {
    // The channel state gates the live query; an agent that answered is
    // authoritative even when individual keys are missing.
    if desc.agent_channel_connected()
        && let Some(data) = guest_source.live_data()
    {
        return Resolution {
            address: guest::extract_address(&data),
            os_id: data.get("os.id").cloned(),
            os_version_id: data.get("os.version-id").cloned(),
        };
    }

    let (os_id, os_version_id) = desc.metadata_os_ids();
    let mut matches = leases::match_by_mac(&desc.mac_addresses, lease_source.snapshot());
    if matches.len() > 1 {
        tracing::debug!(
            extra = matches.len() - 1,
            "multiple leases matched, using the first"
        );
    }

    Resolution {
        address: if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        },
        os_id,
        os_version_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_xml::ChannelTarget;
    use crate::leases::NetworkLease;
    use crate::leases::tests::lease;

    struct Agent(BTreeMap<String, String>);

    impl GuestSource for Agent {
        fn live_data(&self) -> Option<BTreeMap<String, String>> {
            Some(self.0.clone())
        }
    }

    struct UnreachableAgent;

    impl GuestSource for UnreachableAgent {
        fn live_data(&self) -> Option<BTreeMap<String, String>> {
            None
        }
    }

    struct NoAgentExpected;

    impl GuestSource for NoAgentExpected {
        fn live_data(&self) -> Option<BTreeMap<String, String>> {
            panic!("live agent query without a connected channel");
        }
    }

    struct Leases(Vec<NetworkLease>);

    impl LeaseSource for Leases {
        fn snapshot(&self) -> &[NetworkLease] {
            &self.0
        }
    }

    struct NoLeasesExpected;

    impl LeaseSource for NoLeasesExpected {
        fn snapshot(&self) -> &[NetworkLease] {
            panic!("lease correlation ran although the guest agent answered");
        }
    }

    fn connected_desc() -> DomainDescription {
        DomainDescription {
            channels: vec![ChannelTarget {
                name: Some("org.qemu.guest_agent.0".into()),
                state: Some("connected".into()),
            }],
            mac_addresses: vec!["52:54:00:aa:bb:cc".into()],
            os_uri: Some("http://fedoraproject.org/fedora/41".into()),
            disk_sources: Vec::new(),
        }
    }

    fn disconnected_desc() -> DomainDescription {
        DomainDescription {
            channels: vec![ChannelTarget {
                name: Some("org.qemu.guest_agent.0".into()),
                state: None,
            }],
            ..connected_desc()
        }
    }

    fn agent_data() -> BTreeMap<String, String> {
        [
            ("os.id", "fedora"),
            ("os.version-id", "42"),
            ("if.0.name", "eth0"),
            ("if.0.addr.0.type", "ipv4"),
            ("if.0.addr.0.addr", "192.168.122.50"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn guest_path_never_consults_leases() {
        let resolution = resolve(&connected_desc(), &Agent(agent_data()), &NoLeasesExpected);
        assert_eq!(resolution.address.as_deref(), Some("192.168.122.50"));
        assert_eq!(resolution.os_id.as_deref(), Some("fedora"));
        assert_eq!(resolution.os_version_id.as_deref(), Some("42"));
    }

    #[test]
    fn disconnected_channel_never_queries_the_agent() {
        let leases = Leases(vec![lease("52:54:00:aa:bb:cc", "192.168.122.10")]);
        let resolution = resolve(&disconnected_desc(), &NoAgentExpected, &leases);
        assert_eq!(resolution.address.as_deref(), Some("192.168.122.10"));
        // OS ids come from static metadata on this path.
        assert_eq!(resolution.os_id.as_deref(), Some("fedora"));
        assert_eq!(resolution.os_version_id.as_deref(), Some("41"));
    }

    #[test]
    fn unreachable_agent_falls_back_to_leases() {
        let leases = Leases(vec![lease("52:54:00:aa:bb:cc", "192.168.122.10")]);
        let resolution = resolve(&connected_desc(), &UnreachableAgent, &leases);
        assert_eq!(resolution.address.as_deref(), Some("192.168.122.10"));
        assert_eq!(resolution.os_id.as_deref(), Some("fedora"));
    }

    #[test]
    fn agent_answer_short_circuits_even_without_addresses() {
        // An answered query with no usable keys still wins over leases.
        let resolution = resolve(
            &connected_desc(),
            &Agent(BTreeMap::new()),
            &NoLeasesExpected,
        );
        assert_eq!(resolution, Resolution::default());
    }

    #[test]
    fn no_signal_yields_empty_resolution() {
        let desc = DomainDescription::default();
        let resolution = resolve(&desc, &NoAgentExpected, &Leases(Vec::new()));
        assert_eq!(resolution, Resolution::default());
    }
}
