//! Host identifiers and local host information.

use std::path::Path;
use std::sync::OnceLock;

/// A remote machine, as a hostname or IP address.
pub type HostId = String;

const KERNEL_HOSTNAME: &str = "/proc/sys/kernel/hostname";

/// Name of the machine this daemon runs on.
pub fn hostname() -> &'static str {
    static NAME: OnceLock<String> = OnceLock::new();
    NAME.get_or_init(|| {
        read_hostname(Path::new(KERNEL_HOSTNAME))
            .or_else(|| std::env::var("HOSTNAME").ok().and_then(non_empty))
            .unwrap_or_else(|| "unknown".to_string())
    })
}

fn read_hostname(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().and_then(non_empty)
}

fn non_empty(name: String) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
