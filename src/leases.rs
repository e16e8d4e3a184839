use std::collections::HashSet;

/// One DHCP lease as reported by a virtual network's DHCP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkLease {
    pub mac: String,
    pub interface: String,
    pub client_id: String,
    /// Unix seconds.
    pub expiry_time: i64,
    pub address: String,
    pub prefix: u32,
    pub hostname: Option<String>,
}

/// Seam between the resolution pipeline and the lease snapshot, so the
/// pipeline can run against synthetic snapshots in tests.
pub trait LeaseSource {
    fn snapshot(&self) -> &[NetworkLease];
}

/// Aggregate leases across connection URIs. Each URI is fetched
/// independently; a failed fetch contributes an empty partial result for
/// that URI only and never aborts the whole snapshot.
pub fn fetch_all<F>(uris: &[String], mut fetch_uri: F) -> Vec<NetworkLease>
where
    F: FnMut(&str) -> Option<Vec<NetworkLease>>,
{
    let mut all = Vec::new();
    for uri in uris {
        match fetch_uri(uri) {
            Some(leases) => {
                tracing::debug!(%uri, count = leases.len(), "collected DHCP leases");
                all.extend(leases);
            }
            None => {
                tracing::debug!(%uri, "lease connection unavailable, skipping");
            }
        }
    }
    all
}

/// Addresses of every lease whose MAC is in `macs`, preserving lease-list
/// order. Renewed leases can repeat a MAC; the caller takes the first
/// element as the resolved address and treats the rest as informational.
pub fn match_by_mac(macs: &[String], leases: &[NetworkLease]) -> Vec<String> {
    let haystack: HashSet<&str> = macs.iter().map(String::as_str).collect();
    leases
        .iter()
        .filter(|lease| haystack.contains(lease.mac.as_str()))
        .map(|lease| lease.address.clone())
        .collect()
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn lease(mac: &str, address: &str) -> NetworkLease {
        NetworkLease {
            mac: mac.into(),
            interface: "virbr0".into(),
            client_id: String::new(),
            expiry_time: 1_700_000_000,
            address: address.into(),
            prefix: 24,
            hostname: None,
        }
    }

    #[test]
    fn match_empty_intersection_is_empty() {
        let leases = vec![lease("52:54:00:aa:bb:cc", "192.168.122.10")];
        let macs = vec!["52:54:00:00:00:00".to_string()];
        assert!(match_by_mac(&macs, &leases).is_empty());
    }

    #[test]
    fn match_single_lease() {
        let leases = vec![
            lease("52:54:00:aa:bb:cc", "192.168.122.10"),
            lease("52:54:00:dd:ee:ff", "192.168.122.11"),
        ];
        let macs = vec!["52:54:00:dd:ee:ff".to_string()];
        assert_eq!(match_by_mac(&macs, &leases), vec!["192.168.122.11"]);
    }

    #[test]
    fn match_preserves_lease_order_with_duplicates() {
        // A renewed lease repeats the MAC; order must follow the lease list.
        let leases = vec![
            lease("52:54:00:aa:bb:cc", "192.168.122.20"),
            lease("52:54:00:11:22:33", "192.168.122.30"),
            lease("52:54:00:aa:bb:cc", "192.168.122.21"),
        ];
        let macs = vec![
            "52:54:00:aa:bb:cc".to_string(),
            "52:54:00:11:22:33".to_string(),
        ];
        assert_eq!(
            match_by_mac(&macs, &leases),
            vec!["192.168.122.20", "192.168.122.30", "192.168.122.21"]
        );
    }

    #[test]
    fn fetch_all_tolerates_failed_uris() {
        let uris = vec![
            "qemu:///system".to_string(),
            "qemu+ssh://dead/system".to_string(),
            "qemu:///session".to_string(),
        ];
        let collected = fetch_all(&uris, |uri| match uri {
            "qemu:///system" => Some(vec![lease("52:54:00:aa:bb:cc", "192.168.122.10")]),
            "qemu:///session" => Some(vec![lease("52:54:00:dd:ee:ff", "10.0.0.5")]),
            _ => None,
        });
        let addresses: Vec<&str> = collected.iter().map(|l| l.address.as_str()).collect();
        assert_eq!(addresses, vec!["192.168.122.10", "10.0.0.5"]);
    }

    #[test]
    fn fetch_all_preserves_per_uri_order() {
        let uris = vec!["a".to_string(), "b".to_string()];
        let collected = fetch_all(&uris, |uri| match uri {
            "a" => Some(vec![lease("m1", "1.1.1.1"), lease("m2", "2.2.2.2")]),
            _ => Some(vec![lease("m3", "3.3.3.3")]),
        });
        let addresses: Vec<&str> = collected.iter().map(|l| l.address.as_str()).collect();
        assert_eq!(addresses, vec!["1.1.1.1", "2.2.2.2", "3.3.3.3"]);
    }
}
