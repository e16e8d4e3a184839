use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "corral", about = "Disposable VM herder for libvirt")]
pub struct Cli {
    /// Path to config file (default: ~/.config/corral/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new VM from a template image
    Create {
        /// Template image name prefix
        pattern: Option<String>,

        /// List available template images instead of creating a VM
        #[arg(long)]
        list: bool,

        /// Print external commands without running them
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Disk size appended to the qemu-img command
        #[arg(long)]
        disk_size: Option<String>,

        /// Path to a cloud-init user-data file (or a directory holding one)
        #[arg(long)]
        cloud_init: Option<PathBuf>,

        /// Additional arguments passed through to virt-install
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        extra_args: Vec<String>,
    },

    /// Delete managed VMs
    Delete {
        /// Print external commands without running them
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Delete every managed VM
        #[arg(long)]
        all: bool,

        /// VM names
        names: Vec<String>,
    },

    /// List managed VMs
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: ListFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListFormat {
    Table,
    Shell,
    Ansible,
    Json,
}
