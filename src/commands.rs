//! Command handlers for create/delete/list.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::cli::ListFormat;
use crate::cloudinit;
use crate::domains::{DomainInfo, DomainState};
use crate::error::CorralError;
use crate::format;
use crate::naming;
use crate::osinfo;
use crate::pools;
use crate::session::Session;
use crate::util;

pub struct CreateArgs<'a> {
    pub pattern: Option<&'a str>,
    pub list: bool,
    pub dry_run: bool,
    pub disk_size: Option<&'a str>,
    pub cloud_init: Option<&'a Path>,
    pub extra_args: &'a [String],
}

pub fn create(session: &Session, args: &CreateArgs) -> Result<(), CorralError> {
    let pools = session.pools()?;
    let template_map = pools::template_volumes(pools, &session.config().template_pool_names());

    // Base name -> full path; a collision across pools would make the
    // pattern match unpredictable.
    let mut short_map: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in template_map.keys() {
        short_map.insert(pools::volume_base_name(path), path.clone());
    }
    if short_map.len() != template_map.len() {
        return Err(CorralError::DuplicateTemplateNames);
    }

    let pattern = args.pattern.unwrap_or("");
    let matching: Vec<String> = short_map
        .keys()
        .filter(|name| name.starts_with(pattern))
        .cloned()
        .collect();

    if args.list {
        println!("Available VM template images:");
        for name in &matching {
            println!(" {name}");
        }
        return Ok(());
    }

    if matching.is_empty() {
        return Err(CorralError::NoMatchingTemplate);
    }
    if matching.len() > 1 {
        return Err(CorralError::AmbiguousPattern { matches: matching });
    }

    let template_name = &matching[0];
    let template_path = short_map[template_name].clone();
    let template_pool_path = template_map[&template_path].path.clone();
    let managed_pool_path = session.managed_pool()?.path.clone();

    let taken: HashSet<String> = session
        .managed_vms()?
        .iter()
        .map(|vm| vm.name.clone())
        .collect();
    let template = naming::name_template(template_name, pattern);
    let new_name = naming::next_free_name(&template, &taken);
    let image_path = managed_pool_path.join(format!("{new_name}.qcow2"));
    tracing::info!(name = %new_name, template = %template_path.display(), "creating VM");

    let runtime = util::runtime_dir();
    let user_data_path = runtime.join(format!("corral-{new_name}-user-data"));
    let meta_data_path = runtime.join(format!("corral-{new_name}-meta-data"));
    let user_data = cloudinit::user_data(&[
        args.cloud_init,
        Some(&template_pool_path),
        Some(&managed_pool_path),
    ]);
    write_seed_file(&user_data_path, &user_data)?;
    write_seed_file(&meta_data_path, &cloudinit::meta_data(&new_name))?;

    // The name was chosen from a snapshot; a concurrent invocation may have
    // claimed it since. Re-verify right before the image exists on disk.
    session.verify_name_free(&new_name, &image_path)?;

    let mut qemu_img: Vec<String> = [
        "qemu-img",
        "create",
        "-f",
        "qcow2",
        "-b",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    qemu_img.push(template_path.display().to_string());
    qemu_img.push("-F".into());
    qemu_img.push("qcow2".into());
    qemu_img.push(image_path.display().to_string());
    if let Some(size) = args.disk_size {
        qemu_img.push(size.to_string());
    }
    util::execute(&qemu_img, args.dry_run)?;

    let config = session.config();
    let mut virt_install: Vec<String> = vec![
        "virt-install".into(),
        "--name".into(),
        new_name.clone(),
        "--memory".into(),
        config.memory_mb.to_string(),
        "--vcpus".into(),
        config.cpus.to_string(),
        "--disk".into(),
        image_path.display().to_string(),
        "--import".into(),
        "--network".into(),
        format!("bridge={}", config.bridge),
        "--cloud-init".into(),
        format!(
            "user-data={},meta-data={}",
            user_data_path.display(),
            meta_data_path.display()
        ),
        "--noautoconsole".into(),
    ];
    virt_install.extend(args.extra_args.iter().cloned());
    if !virt_install
        .iter()
        .any(|arg| arg == "--osinfo" || arg == "--os-variant")
    {
        let os_id = osinfo::template_osinfo(&template_path, args.dry_run);
        virt_install.push("--osinfo".into());
        virt_install.push(os_id);
    }
    util::execute(&virt_install, args.dry_run)
}

pub fn delete(
    session: &Session,
    names: &[String],
    all: bool,
    dry_run: bool,
) -> Result<(), CorralError> {
    let managed_pool_path = session.managed_pool()?.path.clone();
    let managed = session.managed_vms()?;
    let by_name: BTreeMap<&str, &DomainInfo> =
        managed.iter().map(|vm| (vm.name.as_str(), *vm)).collect();

    let selected: Vec<String> = if all {
        by_name.keys().map(|name| name.to_string()).collect()
    } else {
        names.to_vec()
    };

    for name in &selected {
        // Unknown or unmanaged names are skipped, not errors.
        let Some(vm) = by_name.get(name.as_str()) else {
            tracing::debug!(%name, "not a managed VM, skipping");
            continue;
        };

        if vm.state == DomainState::Running {
            let mut destroy = virsh_base(session);
            destroy.extend(
                ["destroy", "--remove-logs", "--domain", name.as_str()]
                    .iter()
                    .map(|s| s.to_string()),
            );
            util::execute(&destroy, dry_run)?;
        }

        // Only storage inside the managed pool is removed with the domain.
        let disks: Vec<String> = vm
            .disks
            .iter()
            .filter(|disk| disk.starts_with(&managed_pool_path))
            .map(|disk| disk.display().to_string())
            .collect();

        let mut undefine = virsh_base(session);
        undefine.extend(
            ["undefine", "--managed-save", "--storage"]
                .iter()
                .map(|s| s.to_string()),
        );
        undefine.push(disks.join(","));
        undefine.push("--domain".into());
        undefine.push(name.clone());
        util::execute(&undefine, dry_run)?;
    }
    Ok(())
}

pub fn list(session: &Session, format: ListFormat) -> Result<(), CorralError> {
    let vms = session.managed_vms()?;
    let output = match format {
        ListFormat::Table => format::table(&vms),
        ListFormat::Shell => format::shell(&vms),
        ListFormat::Ansible => {
            let ssh_key = cloudinit::ssh_private_key()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "NO_KEY".into());
            format::ansible(&vms, &ssh_key)
        }
        ListFormat::Json => format::json(&vms),
    };
    println!("{output}");
    Ok(())
}

fn virsh_base(session: &Session) -> Vec<String> {
    let mut cmd = vec!["virsh".to_string()];
    if let Some(uri) = &session.config().uri {
        cmd.push("-c".into());
        cmd.push(uri.clone());
    }
    cmd
}

fn write_seed_file(path: &Path, content: &str) -> Result<(), CorralError> {
    std::fs::write(path, content).map_err(|source| CorralError::Io {
        context: format!("writing {}", path.display()),
        source,
    })
}
