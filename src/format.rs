//! Output renderers for the VM snapshot list.

use facet::Facet;

use crate::domains::{DomainInfo, DomainState};

/// Connection user for a VM, from its template prefix first, then its
/// resolved OS id.
pub fn connection_user(vm: &DomainInfo) -> &'static str {
    let template = vm.name.split('-').next().unwrap_or("");
    match template {
        "dsc" => "dscci",
        _ => match vm.os_id.as_deref() {
            Some("fedora") => "fedora",
            Some("rhel") => "cloud-user",
            _ => "",
        },
    }
}

pub fn table(vms: &[&DomainInfo]) -> String {
    let header = format!(
        "{:<30} {:<15} {:<28} {:<10}",
        "NAME", "STATE", "IP ADDRESS", "USER"
    );
    let mut output = vec![header.clone(), "-".repeat(header.len())];
    for vm in vms {
        output.push(format!(
            "{:<30} {:<15} {:<28} {:<10}",
            vm.name,
            vm.state.to_string(),
            vm.address.as_deref().unwrap_or(""),
            connection_user(vm),
        ));
    }
    output.join("\n")
}

pub fn shell(vms: &[&DomainInfo]) -> String {
    let mut output = Vec::new();
    for vm in vms {
        output.push(format!("VM_NAME={}    # {}", vm.name, vm.state));
        output.push(format!("VM_USER={}", connection_user(vm)));
        output.push(format!("IP_ADDR={}", vm.address.as_deref().unwrap_or("")));
        output.push(String::new());
    }
    output.join("\n")
}

/// Ansible inventory lines; hosts that aren't running are commented out so
/// the inventory stays copy-pasteable.
pub fn ansible(vms: &[&DomainInfo], ssh_key: &str) -> String {
    let mut output = Vec::new();
    for vm in vms {
        let comment = if vm.state == DomainState::Running {
            ""
        } else {
            "# "
        };
        output.push(format!(
            "{comment}{} ansible_host={} ansible_ssh_private_key_file={ssh_key} ansible_user={}",
            vm.name,
            vm.address.as_deref().unwrap_or(""),
            connection_user(vm),
        ));
    }
    output.join("\n")
}

#[derive(Facet)]
struct DomainJson {
    name: String,
    uuid: String,
    state: String,
    address: Option<String>,
    os_id: Option<String>,
    os_version_id: Option<String>,
    user: String,
}

pub fn json(vms: &[&DomainInfo]) -> String {
    let view: Vec<DomainJson> = vms
        .iter()
        .map(|vm| DomainJson {
            name: vm.name.clone(),
            uuid: vm.uuid.clone(),
            state: vm.state.to_string(),
            address: vm.address.clone(),
            os_id: vm.os_id.clone(),
            os_version_id: vm.os_version_id.clone(),
            user: connection_user(vm).to_string(),
        })
        .collect();
    facet_json::to_string(&view).expect("JSON serialization")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tests::vm;

    fn sample() -> Vec<DomainInfo> {
        let mut running = vm("fedora-1", DomainState::Running, &["/pool/fedora-1.qcow2"]);
        running.address = Some("192.168.122.50".into());
        running.os_id = Some("fedora".into());

        let stopped = vm("rhel-2", DomainState::ShutOff, &["/pool/rhel-2.qcow2"]);
        vec![running, stopped]
    }

    #[test]
    fn user_from_template_prefix_wins() {
        let mut info = vm("dsc-ci-3", DomainState::Running, &[]);
        info.os_id = Some("fedora".into());
        assert_eq!(connection_user(&info), "dscci");
    }

    #[test]
    fn user_falls_back_to_os_id() {
        let mut info = vm("whatever-1", DomainState::Running, &[]);
        info.os_id = Some("rhel".into());
        assert_eq!(connection_user(&info), "cloud-user");
        info.os_id = None;
        assert_eq!(connection_user(&info), "");
    }

    #[test]
    fn table_lists_every_vm_under_the_header() {
        let vms = sample();
        let refs: Vec<&DomainInfo> = vms.iter().collect();
        let output = table(&refs);
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[1].starts_with("---"));
        assert!(lines[2].contains("fedora-1"));
        assert!(lines[2].contains("RUNNING"));
        assert!(lines[2].contains("192.168.122.50"));
        assert!(lines[3].contains("rhel-2"));
        assert!(lines[3].contains("SHUTOFF"));
    }

    #[test]
    fn shell_emits_one_block_per_vm() {
        let vms = sample();
        let refs: Vec<&DomainInfo> = vms.iter().collect();
        let output = shell(&refs);
        assert!(output.contains("VM_NAME=fedora-1    # RUNNING"));
        assert!(output.contains("VM_USER=fedora"));
        assert!(output.contains("IP_ADDR=192.168.122.50"));
        assert!(output.contains("VM_NAME=rhel-2    # SHUTOFF"));
    }

    #[test]
    fn ansible_comments_out_stopped_hosts() {
        let vms = sample();
        let refs: Vec<&DomainInfo> = vms.iter().collect();
        let output = ansible(&refs, "/home/me/.ssh/id_ed25519");
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("fedora-1 ansible_host=192.168.122.50"));
        assert!(lines[0].contains("ansible_ssh_private_key_file=/home/me/.ssh/id_ed25519"));
        assert!(lines[1].starts_with("# rhel-2"));
    }

    #[test]
    fn json_carries_resolution_fields() {
        let vms = sample();
        let refs: Vec<&DomainInfo> = vms.iter().collect();
        let output = json(&refs);
        assert!(output.contains("\"fedora-1\""));
        assert!(output.contains("\"192.168.122.50\""));
        assert!(output.contains("\"SHUTOFF\""));
    }
}
