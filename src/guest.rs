//! Typed view over the flattened key/value map reported by the in-guest
//! agent (`if.<n>.name`, `if.<n>.addr.<m>.addr`, `os.id`, ...).

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestAddress {
    pub address: String,
    /// Address family name as reported (`"ipv4"` / `"ipv6"`); absent when
    /// the agent omitted the `.type` sibling.
    pub family: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestInterface {
    pub index: u32,
    pub name: Option<String>,
    pub addresses: Vec<GuestAddress>,
}

/// Parse the flattened per-interface keys into structured records, ordered
/// by interface index. Keys that don't follow the `if.<n>.` scheme (such as
/// `if.count`) are ignored.
pub fn parse_interfaces(data: &BTreeMap<String, String>) -> Vec<GuestInterface> {
    let mut indices: Vec<u32> = data
        .keys()
        .filter_map(|key| key.strip_prefix("if."))
        .filter_map(|rest| rest.split('.').next())
        .filter_map(|id| id.parse().ok())
        .collect();
    indices.sort_unstable();
    indices.dedup();

    indices
        .into_iter()
        .map(|index| {
            let name = data.get(&format!("if.{index}.name")).cloned();
            let addr_prefix = format!("if.{index}.addr.");
            let addresses = data
                .iter()
                .filter(|(key, _)| key.starts_with(&addr_prefix) && key.ends_with(".addr"))
                .map(|(key, value)| {
                    let family_key = format!("{}.type", &key[..key.len() - ".addr".len()]);
                    GuestAddress {
                        address: value.clone(),
                        family: data.get(&family_key).cloned(),
                    }
                })
                .collect();
            GuestInterface {
                index,
                name,
                addresses,
            }
        })
        .collect()
}

/// Pick one representative address from the agent data: drop the loopback
/// interface by name, then sort the remaining (address, family) pairs by
/// the family name string so `"ipv4"` wins over `"ipv6"`.
pub fn extract_address(data: &BTreeMap<String, String>) -> Option<String> {
    let mut candidates: Vec<GuestAddress> = parse_interfaces(data)
        .into_iter()
        .filter(|iface| iface.name.as_deref() != Some("lo"))
        .flat_map(|iface| iface.addresses)
        .collect();

    candidates.sort_by(|a, b| a.family.cmp(&b.family));
    candidates.into_iter().next().map(|a| a.address)
}
