//! Process table lookups.

use std::ffi::OsStr;

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Pid of a process named exactly `name`, the lowest if there are several.
pub(crate) fn find_by_name(name: &str) -> Option<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
        .processes_by_exact_name(OsStr::new(name))
        .map(|process| process.pid().as_u32())
        .min()
}

/// Whether `pid` is still in the process table.
pub(crate) fn is_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}
