//! Local host information
//!
//! Reads CPU, memory and OS identity from `/proc` and `/etc`. Nothing here
//! touches the network. CPU and memory data are required; hostname and OS
//! naming degrade to `"unknown"` when the files are missing.

use crate::error::HostInfoError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct HostInfo {
    pub hostname: String,
    pub os_name: String,
    pub kernel_version: String,
    pub arch: &'static str,
    pub cpu_model: String,
    pub logical_cpus: u32,
    pub memory_total_bytes: u64,
    pub memory_available_bytes: u64,
}

const UNKNOWN: &str = "unknown";

impl HostInfo {
    /// Collect from the running system
    pub fn collect() -> Result<Self, HostInfoError> {
        Self::collect_from("/")
    }

    /// Collect with every system path resolved under `root`
    pub fn collect_from(root: impl AsRef<Path>) -> Result<Self, HostInfoError> {
        let root = root.as_ref();
        let (cpu_model, logical_cpus) = read_cpu(root)?;
        let (memory_total_bytes, memory_available_bytes) = read_memory(root)?;

        Ok(Self {
            hostname: read_hostname(root).unwrap_or_else(|| UNKNOWN.to_string()),
            os_name: read_os_name(root).unwrap_or_else(|| std::env::consts::OS.to_string()),
            kernel_version: read_kernel_version(root).unwrap_or_else(|| UNKNOWN.to_string()),
            arch: std::env::consts::ARCH,
            cpu_model,
            logical_cpus,
            memory_total_bytes,
            memory_available_bytes,
        })
    }

    /// Emit the summary through the log
    pub fn log(&self) {
        tracing::info!("Host: {} ({} {}, kernel {})", self.hostname, self.os_name, self.arch, self.kernel_version);
        tracing::info!("CPU: {} x {}", self.logical_cpus, self.cpu_model);
        tracing::info!(
            "Memory: {} total, {} available",
            format_size(self.memory_total_bytes),
            format_size(self.memory_available_bytes)
        );
    }
}

fn path(root: &Path, rel: &str) -> PathBuf {
    root.join(rel.trim_start_matches('/'))
}

fn read(root: &Path, rel: &str) -> Result<String, HostInfoError> {
    let p = path(root, rel);
    fs::read_to_string(&p).map_err(|e| HostInfoError::new(p.display().to_string(), e))
}

fn read_hostname(root: &Path) -> Option<String> {
    ["/etc/hostname", "/proc/sys/kernel/hostname"]
        .iter()
        .filter_map(|rel| read(root, rel).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

fn read_os_name(root: &Path) -> Option<String> {
    let content = read(root, "/etc/os-release").ok()?;
    let mut name = None;
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("PRETTY_NAME=") {
            return Some(v.trim_matches('"').to_string());
        }
        if let Some(v) = line.strip_prefix("NAME=") {
            name = Some(v.trim_matches('"').to_string());
        }
    }
    name
}

fn read_kernel_version(root: &Path) -> Option<String> {
    // "Linux version X.Y.Z ..."
    read(root, "/proc/version")
        .ok()?
        .split_whitespace()
        .nth(2)
        .map(str::to_string)
}

fn read_cpu(root: &Path) -> Result<(String, u32), HostInfoError> {
    let content = read(root, "/proc/cpuinfo")?;

    let mut model = None;
    let mut count = 0u32;
    for line in content.lines() {
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        match field.trim() {
            "processor" => count += 1,
            "model name" | "Model" | "cpu model" if model.is_none() => {
                model = Some(value.trim().to_string());
            }
            _ => {}
        }
    }

    if count == 0 {
        return Err(HostInfoError::new("/proc/cpuinfo", "no processor entries"));
    }

    Ok((model.unwrap_or_else(|| UNKNOWN.to_string()), count))
}

fn read_memory(root: &Path) -> Result<(u64, u64), HostInfoError> {
    let content = read(root, "/proc/meminfo")?;

    let mut total = None;
    let mut available = None;
    let mut free = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(field), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        // Values in /proc/meminfo are in kB
        let Ok(kb) = value.parse::<u64>() else {
            continue;
        };
        match field {
            "MemTotal:" => total = Some(kb.saturating_mul(1024)),
            "MemAvailable:" => available = Some(kb.saturating_mul(1024)),
            "MemFree:" => free = Some(kb.saturating_mul(1024)),
            _ => {}
        }
    }

    let total = total.ok_or_else(|| HostInfoError::new("/proc/meminfo", "MemTotal not found"))?;
    Ok((total, available.or(free).unwrap_or(0)))
}

/// Format size in human-readable form
fn format_size(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= GIB {
        format!("{:.2} GB", b / GIB)
    } else if b >= MIB {
        format!("{:.2} MB", b / MIB)
    } else {
        format!("{} B", bytes)
    }
}
