use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Volume extensions considered disk images.
const IMAGE_EXTENSIONS: [&str; 2] = ["qcow2", "img"];

#[derive(Debug, Clone)]
pub struct PoolInfo {
    pub name: String,
    pub uuid: String,
    pub path: PathBuf,
    /// Image volumes only; other volume types are dropped at fetch time.
    pub volumes: Vec<PathBuf>,
}

/// Target path of a storage pool: the first `<path>` element with text.
pub fn pool_path_from_xml(xml: &str) -> Option<PathBuf> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    doc.descendants()
        .filter(|node| node.has_tag_name("path"))
        .find_map(|node| node.text())
        .map(PathBuf::from)
}

/// Keep only volumes that look like disk images.
pub fn filter_image_volumes(volumes: Vec<PathBuf>) -> Vec<PathBuf> {
    volumes
        .into_iter()
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                })
        })
        .collect()
}

pub fn find_pool<'a>(pools: &'a [PoolInfo], name: &str) -> Option<&'a PoolInfo> {
    pools.iter().find(|pool| pool.name == name)
}

/// Map every template image path in the allowed pools to its owning pool.
pub fn template_volumes<'a>(
    pools: &'a [PoolInfo],
    allowed: &[String],
) -> BTreeMap<PathBuf, &'a PoolInfo> {
    let mut volumes = BTreeMap::new();
    for pool in pools {
        if !allowed.iter().any(|name| *name == pool.name) {
            continue;
        }
        for volume in &pool.volumes {
            volumes.insert(volume.clone(), pool);
        }
    }
    volumes
}

/// Base file name of a volume path, lossily decoded.
pub fn volume_base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
