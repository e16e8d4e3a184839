//! Cloud-init seed content for freshly created VMs.

use std::path::{Path, PathBuf};

/// Key files probed under `~/.ssh`, in preference order.
const SSH_KEY_FILES: [&str; 5] = [
    "id_ecdsa",
    "id_ecdsa_sk",
    "id_ed25519",
    "id_ed25519_sk",
    "id_rsa",
];

/// Resolve the user-data content from the first readable candidate. A
/// directory candidate means `<dir>/cloud-init/user-data`. When nothing is
/// readable, fall back to a generated config that authorizes the local
/// user's SSH keys.
pub fn user_data(candidates: &[Option<&Path>]) -> String {
    for candidate in candidates.iter().flatten() {
        let path = if candidate.is_dir() {
            candidate.join("cloud-init").join("user-data")
        } else {
            candidate.to_path_buf()
        };
        if let Ok(content) = std::fs::read_to_string(&path) {
            tracing::debug!(path = %path.display(), "using cloud-init user-data");
            return content;
        }
    }
    default_user_data(&public_key_contents())
}

pub fn meta_data(vm_name: &str) -> String {
    format!("local-hostname: '{vm_name}'\n")
}

/// Generated `#cloud-config` used when no user-data file is available.
pub fn default_user_data(public_keys: &[String]) -> String {
    let mut content = vec![
        "#cloud-config".to_string(),
        "allow_public_ssh_keys: true".to_string(),
    ];
    if !public_keys.is_empty() {
        content.push("ssh_authorized_keys:".to_string());
        for key in public_keys {
            content.push(format!("  - \"{key}\""));
        }
    }
    content.join("\n")
}

/// Well-known public keys present in the user's `~/.ssh`.
pub fn ssh_public_keys() -> Vec<PathBuf> {
    let Some(ssh_dir) = dirs::home_dir().map(|home| home.join(".ssh")) else {
        return Vec::new();
    };

    let mut keys: Vec<PathBuf> = SSH_KEY_FILES
        .iter()
        .map(|name| ssh_dir.join(format!("{name}.pub")))
        .filter(|path| path.exists())
        .collect();
    keys.sort();
    keys
}

/// First private key found under `~/.ssh`, for generated SSH/ansible hints.
pub fn ssh_private_key() -> Option<PathBuf> {
    let ssh_dir = dirs::home_dir()?.join(".ssh");
    SSH_KEY_FILES
        .iter()
        .map(|name| ssh_dir.join(name))
        .find(|path| path.exists())
}

fn public_key_contents() -> Vec<String> {
    ssh_public_keys()
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .collect()
}
