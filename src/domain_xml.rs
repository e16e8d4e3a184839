//! Typed queries over a domain's XML description.
//!
//! One parse pass extracts everything the resolution pipeline needs —
//! guest-agent channel state, interface MAC addresses, the vendor OS
//! metadata URI, and file-backed disk paths — so the rest of the code never
//! touches raw XML.

use std::path::PathBuf;

/// Channel target names under this prefix belong to the QEMU guest agent.
pub const GUEST_AGENT_CHANNEL_PREFIX: &str = "org.qemu.guest_agent";

const LIBOSINFO_NS: &str = "http://libosinfo.org/xmlns/libvirt/domain/1.0";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTarget {
    pub name: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DomainDescription {
    pub channels: Vec<ChannelTarget>,
    pub mac_addresses: Vec<String>,
    /// `id` attribute of the libosinfo-namespaced `<os>` metadata element.
    pub os_uri: Option<String>,
    pub disk_sources: Vec<PathBuf>,
}

impl DomainDescription {
    pub fn parse(xml: &str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(xml)?;

        let channels = doc
            .descendants()
            .filter(|node| node.has_tag_name("channel"))
            .filter_map(|channel| {
                channel
                    .children()
                    .find(|child| child.has_tag_name("target"))
            })
            .map(|target| ChannelTarget {
                name: target.attribute("name").map(str::to_string),
                state: target.attribute("state").map(str::to_string),
            })
            .collect();

        let mac_addresses = doc
            .descendants()
            .filter(|node| node.has_tag_name("interface"))
            .flat_map(|iface| iface.children().filter(|child| child.has_tag_name("mac")))
            .filter_map(|mac| mac.attribute("address"))
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect();

        let os_uri = doc
            .descendants()
            .find(|node| {
                node.tag_name().name() == "os"
                    && node.tag_name().namespace() == Some(LIBOSINFO_NS)
            })
            .and_then(|node| node.attribute("id"))
            .map(str::to_string);

        let disk_sources = doc
            .descendants()
            .filter(|node| node.has_tag_name("disk"))
            .flat_map(|disk| {
                disk.children()
                    .filter(|child| child.has_tag_name("source"))
            })
            .filter_map(|source| source.attribute("file"))
            .filter(|path| path.starts_with('/'))
            .map(PathBuf::from)
            .collect();

        Ok(Self {
            channels,
            mac_addresses,
            os_uri,
            disk_sources,
        })
    }

    /// True iff a guest-agent channel exists and libvirt recorded it as
    /// connected. A missing state attribute counts as disconnected.
    pub fn agent_channel_connected(&self) -> bool {
        self.channels.iter().any(|target| {
            target
                .name
                .as_deref()
                .is_some_and(|name| name.starts_with(GUEST_AGENT_CHANNEL_PREFIX))
                && target.state.as_deref().unwrap_or("disconnected") == "connected"
        })
    }

    /// Distro and version from the vendor OS URI, whose path encodes
    /// `{distro}/{version}`. The authoritative mapping lives in the osinfo
    /// database; splitting the path covers all common identifiers.
    pub fn metadata_os_ids(&self) -> (Option<String>, Option<String>) {
        let Some(uri) = self.os_uri.as_deref() else {
            return (None, None);
        };

        let path = uri_path(uri).trim_matches('/');
        let (os_id, version) = match path.split_once('/') {
            Some((os_id, version)) => (os_id, version),
            None => (path, ""),
        };

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        (non_empty(os_id), non_empty(version))
    }
}

fn uri_path(uri: &str) -> &str {
    let rest = match uri.find("://") {
        Some(i) => &uri[i + 3..],
        None => return uri,
    };
    match rest.find('/') {
        Some(i) => &rest[i..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_DOMAIN: &str = r#"<domain type='kvm'>
  <name>fedora-1</name>
  <metadata>
    <libosinfo:libosinfo xmlns:libosinfo="http://libosinfo.org/xmlns/libvirt/domain/1.0">
      <libosinfo:os id="http://fedoraproject.org/fedora/42"/>
    </libosinfo:libosinfo>
  </metadata>
  <devices>
    <disk type='file' device='disk'>
      <driver name='qemu' type='qcow2'/>
      <source file='/var/lib/libvirt/images/fedora-1.qcow2'/>
      <target dev='vda' bus='virtio'/>
    </disk>
    <disk type='file' device='cdrom'>
      <target dev='sda' bus='sata'/>
    </disk>
    <interface type='bridge'>
      <mac address='52:54:00:aa:bb:cc'/>
      <source bridge='virbr0'/>
    </interface>
    <serial type='pty'>
      <target port='0'/>
    </serial>
    <channel type='unix'>
      <target type='virtio' name='org.qemu.guest_agent.0' state='connected'/>
    </channel>
  </devices>
</domain>"#;

    #[test]
    fn parses_all_sections() {
        let desc = DomainDescription::parse(FULL_DOMAIN).unwrap();
        assert!(desc.agent_channel_connected());
        assert_eq!(desc.mac_addresses, vec!["52:54:00:aa:bb:cc"]);
        assert_eq!(
            desc.os_uri.as_deref(),
            Some("http://fedoraproject.org/fedora/42")
        );
        assert_eq!(
            desc.disk_sources,
            vec![PathBuf::from("/var/lib/libvirt/images/fedora-1.qcow2")]
        );
    }

    #[test]
    fn metadata_os_ids_split_the_uri_path() {
        let desc = DomainDescription::parse(FULL_DOMAIN).unwrap();
        assert_eq!(
            desc.metadata_os_ids(),
            (Some("fedora".to_string()), Some("42".to_string()))
        );
    }

    #[test]
    fn missing_channel_state_counts_as_disconnected() {
        let xml = r#"<domain>
  <devices>
    <channel type='unix'>
      <target type='virtio' name='org.qemu.guest_agent.0'/>
    </channel>
  </devices>
</domain>"#;
        let desc = DomainDescription::parse(xml).unwrap();
        assert!(!desc.agent_channel_connected());
    }

    #[test]
    fn connected_non_agent_channel_does_not_count() {
        let xml = r#"<domain>
  <devices>
    <channel type='spicevmc'>
      <target type='virtio' name='com.redhat.spice.0' state='connected'/>
    </channel>
  </devices>
</domain>"#;
        let desc = DomainDescription::parse(xml).unwrap();
        assert!(!desc.agent_channel_connected());
    }

    #[test]
    fn domain_without_metadata_has_no_os_ids() {
        let xml = "<domain><devices/></domain>";
        let desc = DomainDescription::parse(xml).unwrap();
        assert_eq!(desc.metadata_os_ids(), (None, None));
    }

    #[test]
    fn os_uri_without_version_segment() {
        let mut desc = DomainDescription::default();
        desc.os_uri = Some("http://libosinfo.org/linux".into());
        assert_eq!(desc.metadata_os_ids(), (Some("linux".to_string()), None));
    }

    #[test]
    fn multiple_interfaces_collect_every_mac() {
        let xml = r#"<domain>
  <devices>
    <interface type='network'><mac address='52:54:00:00:00:01'/></interface>
    <interface type='bridge'><mac address='52:54:00:00:00:02'/></interface>
  </devices>
</domain>"#;
        let desc = DomainDescription::parse(xml).unwrap();
        assert_eq!(
            desc.mac_addresses,
            vec!["52:54:00:00:00:01", "52:54:00:00:00:02"]
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(DomainDescription::parse("<domain><unclosed>").is_err());
    }
}
