//! Per-invocation context: one primary connection plus memoized snapshots
//! of leases, pools, and domains. All caching is scoped to this value, so
//! two invocations never share state and tests can drive the resolution
//! pipeline with synthetic snapshots instead (see `resolve`).

use std::cell::OnceCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::domain_xml::DomainDescription;
use crate::domains::{self, DomainInfo};
use crate::error::CorralError;
use crate::leases::{self, LeaseSource, NetworkLease};
use crate::libvirt::{self, AgentQuery, ConnGuard};
use crate::pools::{self, PoolInfo};
use crate::resolve;

pub struct Session {
    config: Config,
    conn: ConnGuard,
    leases: OnceCell<Vec<NetworkLease>>,
    pools: OnceCell<Vec<PoolInfo>>,
    domains: OnceCell<Vec<DomainInfo>>,
}

impl Session {
    pub fn open(config: Config) -> Result<Self, CorralError> {
        let conn = libvirt::connect(config.uri.as_deref())?;
        Ok(Self {
            config,
            conn,
            leases: OnceCell::new(),
            pools: OnceCell::new(),
            domains: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lease snapshot across all configured connections, fetched once per
    /// session. Unreachable connections contribute nothing.
    pub fn leases(&self) -> &[NetworkLease] {
        self.leases.get_or_init(|| {
            leases::fetch_all(&self.config.lease_connections(), libvirt::leases_for_uri)
        })
    }

    pub fn pools(&self) -> Result<&[PoolInfo], CorralError> {
        if let Some(pools) = self.pools.get() {
            return Ok(pools);
        }
        let fetched = libvirt::fetch_pools(&self.conn)?;
        Ok(self.pools.get_or_init(|| fetched))
    }

    /// Domain snapshots with resolved address and OS fields, built once per
    /// session.
    pub fn domains(&self) -> Result<&[DomainInfo], CorralError> {
        if let Some(domains) = self.domains.get() {
            return Ok(domains);
        }
        let built = self.build_domains()?;
        Ok(self.domains.get_or_init(|| built))
    }

    fn build_domains(&self) -> Result<Vec<DomainInfo>, CorralError> {
        let raw = libvirt::fetch_domains(&self.conn)?;
        let lease_source = SessionLeases(self);

        let mut result = Vec::new();
        for domain in raw {
            let desc = match DomainDescription::parse(&domain.xml) {
                Ok(desc) => desc,
                Err(e) => {
                    // Malformed static config degrades to "no data"; the
                    // snapshot still carries name and state.
                    tracing::warn!(name = %domain.name, error = %e, "unusable domain XML");
                    DomainDescription::default()
                }
            };

            let agent = AgentQuery {
                uri: self.config.uri.as_deref(),
                domain: &domain.name,
            };
            let resolution = resolve::resolve(&desc, &agent, &lease_source);

            result.push(DomainInfo {
                name: domain.name,
                uuid: domain.uuid,
                state: domain.state,
                disks: desc.disk_sources,
                address: resolution.address,
                os_id: resolution.os_id,
                os_version_id: resolution.os_version_id,
            });
        }
        Ok(result)
    }

    /// The pool managed VMs live in. Its absence is a configuration error,
    /// not a degradable source failure.
    pub fn managed_pool(&self) -> Result<&PoolInfo, CorralError> {
        let pools = self.pools()?;
        pools::find_pool(pools, &self.config.pool).ok_or_else(|| CorralError::PoolNotFound {
            name: self.config.pool.clone(),
        })
    }

    /// Domains with at least one disk in the managed pool.
    pub fn managed_vms(&self) -> Result<Vec<&DomainInfo>, CorralError> {
        let pool = self.managed_pool()?;
        let volumes: HashSet<PathBuf> = pool.volumes.iter().cloned().collect();
        Ok(domains::managed(self.domains()?, &volumes))
    }

    /// Re-check that a chosen VM name is still free, against the live
    /// domain list rather than this session's snapshot. Called immediately
    /// before the irreversible image-creation step to shrink the window in
    /// which a concurrent invocation can pick the same name.
    pub fn verify_name_free(&self, name: &str, image_path: &Path) -> Result<(), CorralError> {
        let names = libvirt::list_domain_names(&self.conn)?;
        if names.iter().any(|taken| taken == name) || image_path.exists() {
            return Err(CorralError::NameTaken {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

struct SessionLeases<'a>(&'a Session);

impl LeaseSource for SessionLeases<'_> {
    fn snapshot(&self) -> &[NetworkLease] {
        self.0.leases()
    }
}
