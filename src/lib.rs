#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod cli;
pub mod cloudinit;
pub mod commands;
pub mod config;
pub mod domain_xml;
pub mod domains;
pub mod error;
pub mod format;
pub mod guest;
pub mod leases;
pub mod libvirt;
pub mod naming;
pub mod osinfo;
pub mod pools;
pub mod resolve;
pub mod session;
pub mod util;
