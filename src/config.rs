use std::path::{Path, PathBuf};

use facet::Facet;

use crate::error::CorralError;

/// Connection URIs consulted for DHCP leases when the config leaves
/// `connections` empty. Session VMs commonly sit on the bridge owned by the
/// system instance's default network, so both ends are queried.
const DEFAULT_LEASE_CONNECTIONS: [&str; 2] = ["qemu:///system", "qemu:///session"];

const DEFAULT_TEMPLATE_POOLS: [&str; 1] = ["default"];

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct Config {
    /// Storage pool holding the disks of managed VMs.
    #[facet(default = "corral")]
    pub pool: String,

    /// Pools searched for template images. Empty = built-in default.
    #[facet(default)]
    pub template_pools: Vec<String>,

    /// Connection URIs queried for DHCP leases. Empty = built-in default.
    #[facet(default)]
    pub connections: Vec<String>,

    /// Primary connection URI. None lets libvirt pick its default.
    pub uri: Option<String>,

    #[facet(default = 2048)]
    pub memory_mb: u64,

    #[facet(default = 2)]
    pub cpus: u32,

    /// Host bridge new VMs are attached to.
    #[facet(default = "virbr0")]
    pub bridge: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: "corral".into(),
            template_pools: Vec::new(),
            connections: Vec::new(),
            uri: None,
            memory_mb: 2048,
            cpus: 2,
            bridge: "virbr0".into(),
        }
    }
}

impl Config {
    /// Pools searched for template images, with the built-in fallback.
    pub fn template_pool_names(&self) -> Vec<String> {
        if self.template_pools.is_empty() {
            DEFAULT_TEMPLATE_POOLS.iter().map(|s| s.to_string()).collect()
        } else {
            self.template_pools.clone()
        }
    }

    /// Lease connection URIs, with the built-in fallback.
    pub fn lease_connections(&self) -> Vec<String> {
        if self.connections.is_empty() {
            DEFAULT_LEASE_CONNECTIONS.iter().map(|s| s.to_string()).collect()
        } else {
            self.connections.clone()
        }
    }
}

// ── validation ────────────────────────────────────────────

fn validate_config(config: &Config) -> Result<(), CorralError> {
    if config.pool.trim().is_empty() {
        return Err(CorralError::Validation {
            message: "pool must not be empty".into(),
        });
    }
    if config.cpus < 1 {
        return Err(CorralError::Validation {
            message: "cpus must be at least 1".into(),
        });
    }
    if config.memory_mb < 256 {
        return Err(CorralError::Validation {
            message: "memory_mb must be at least 256".into(),
        });
    }
    if config.bridge.trim().is_empty() {
        return Err(CorralError::Validation {
            message: "bridge must not be empty".into(),
        });
    }
    Ok(())
}

// ── environment overrides ─────────────────────────────────

/// Apply the environment contract on top of the parsed config.
/// `CORRAL_POOL` replaces the managed pool name, `CORRAL_TEMPLATE_POOLS`
/// is a comma-separated template pool list.
fn apply_overrides(config: &mut Config, pool: Option<String>, template_pools: Option<String>) {
    if let Some(pool) = pool {
        config.pool = pool;
    }
    if let Some(pools) = template_pools {
        config.template_pools = pools
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }
}

fn apply_env(config: &mut Config) {
    apply_overrides(
        config,
        std::env::var("CORRAL_POOL").ok(),
        std::env::var("CORRAL_TEMPLATE_POOLS").ok(),
    );
}

// ── public API ────────────────────────────────────────────

/// Default config location: `~/.config/corral/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("corral").join("config.toml"))
}

/// Load the config. An explicitly given path must exist; the default
/// location is optional and falls back to built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, CorralError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => match default_config_path() {
            Some(ref default) if default.exists() => parse_file(default)?,
            _ => Config::default(),
        },
    };

    apply_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<Config, CorralError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CorralError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    facet_toml::from_str(&contents).map_err(|e| CorralError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
