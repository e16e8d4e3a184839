//! OS short-identifier matching for template images.
//!
//! The osinfo database is authoritative for `--osinfo` values; this module
//! reconciles its catalog with whatever `virt-inspector` could extract from
//! the template, falling back to filename heuristics. The result is always
//! a usable string; `"unknown"` is a valid terminal value, not an error.

use std::path::Path;
use std::process::Command;

/// Fields of the inspector's operating-system record we care about. `name`
/// carries the kernel family (`"linux"`, `"windows"`), not a distro name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectionData {
    pub osinfo: Option<String>,
    pub distro: Option<String>,
    pub major_version: Option<String>,
    pub minor_version: Option<String>,
    pub name: Option<String>,
}

/// Parse `virt-inspector` output. None when the document is malformed or
/// carries no operating-system record.
pub fn parse_inspector_output(xml: &str) -> Option<InspectionData> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    let os_elem = doc
        .descendants()
        .find(|node| node.has_tag_name("operatingsystem"))?;

    let mut data = InspectionData::default();
    for child in os_elem.children().filter(|node| node.is_element()) {
        let value = child.text().map(str::to_string);
        match child.tag_name().name() {
            "osinfo" => data.osinfo = value,
            "distro" => data.distro = value,
            "major_version" => data.major_version = value,
            "minor_version" => data.minor_version = value,
            "name" => data.name = value,
            _ => {}
        }
    }
    Some(data)
}

/// Short identifiers known to the local osinfo catalog. The query tool
/// prints a fixed two-line header before the identifiers.
pub fn parse_short_id_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(2)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Query the local OS catalog. Dry-run mode and an unavailable catalog both
/// degrade to a single-sentinel set so matching can still terminate.
pub fn known_os_ids(dry_run: bool) -> Vec<String> {
    if dry_run {
        return vec!["linux2024".into()];
    }

    let output = Command::new("osinfo-query")
        .args(["os", "-f", "short-id"])
        .output();
    match output {
        Ok(output) if output.status.success() => {
            parse_short_id_list(&String::from_utf8_lossy(&output.stdout))
        }
        _ => {
            tracing::warn!("osinfo-query unavailable, falling back to the sentinel catalog");
            vec!["linux2024".into()]
        }
    }
}

/// Run `virt-inspector` on the template image. Any failure (missing tool,
/// non-zero exit, unusable output) yields None; matching then relies on the
/// filename heuristics.
pub fn inspect_template(image_path: &Path, dry_run: bool) -> Option<InspectionData> {
    if dry_run {
        return None;
    }

    println!("virt-inspector -a {}", image_path.display());
    let output = Command::new("virt-inspector")
        .arg("-a")
        .arg(image_path)
        .output()
        .ok()?;
    if !output.status.success() {
        tracing::debug!(
            image = %image_path.display(),
            code = output.status.code(),
            "virt-inspector failed"
        );
        return None;
    }
    parse_inspector_output(&String::from_utf8_lossy(&output.stdout))
}

/// Pick the best OS short-identifier. Inspection data wins when usable;
/// filename truncation absorbs version-suffix mismatches between the file
/// name and the catalog (`fedora-42-beta` vs `fedora42`).
pub fn match_os_id(
    known: &[String],
    inspection: Option<&InspectionData>,
    file_name: &str,
) -> String {
    if let Some(inspection) = inspection {
        if let Some(osinfo) = &inspection.osinfo
            && known.contains(osinfo)
        {
            return osinfo.clone();
        }

        if let Some(distro) = &inspection.distro {
            let major = inspection.major_version.as_deref().unwrap_or("");
            let minor = inspection.minor_version.as_deref().unwrap_or("");

            let mut candidates = Vec::new();
            if !major.is_empty() && !minor.is_empty() {
                candidates.push(format!("{distro}{major}.{minor}"));
            }
            if !major.is_empty() {
                candidates.push(format!("{distro}{major}"));
                candidates.push(format!("{distro}{major}-unknown"));
            }
            candidates.push(distro.clone());
            candidates.push(format!("{distro}-unknown"));

            for candidate in candidates {
                if known.contains(&candidate) {
                    return candidate;
                }
            }
        }
    }

    let mut name = file_name;
    while !name.is_empty() {
        let without_dashes = name.replace('-', "");
        let candidates = [
            name.to_string(),
            format!("{name}-unknown"),
            without_dashes.clone(),
            format!("{without_dashes}-unknown"),
        ];
        for candidate in candidates {
            let candidate = candidate.to_lowercase();
            if known.contains(&candidate) {
                return candidate;
            }
        }
        let last = name.char_indices().next_back().map(|(i, _)| i).unwrap_or(0);
        name = &name[..last];
    }

    if let Some(inspection) = inspection
        && inspection.name.as_deref() == Some("linux")
    {
        return "linux2024".into();
    }

    "unknown".into()
}

/// Composition used by `create`: catalog + inspection + filename.
pub fn template_osinfo(image_path: &Path, dry_run: bool) -> String {
    let known = known_os_ids(dry_run);
    let inspection = inspect_template(image_path, dry_run);
    let file_name = image_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");

    match_os_id(&known, inspection.as_ref(), file_name)
}
