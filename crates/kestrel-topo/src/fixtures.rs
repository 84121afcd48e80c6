use std::fmt::Write;

use crate::{Thread, ThreadSet};

/// 2 sockets x 4 cores x 2 threads, numbered the way Linux enumerates such a machine: first
/// hyperthread of every core across both sockets, then the second hyperthreads.
pub(crate) fn two_socket_topology() -> ThreadSet {
    let mut threads = Vec::new();
    for ht in 0..2u32 {
        for socket in 0..2u32 {
            for core in 0..4u32 {
                threads.push(Thread::new(ht * 8 + socket * 4 + core, core, socket));
            }
        }
    }
    threads.into_iter().collect()
}

/// `/proc/cpuinfo` text describing `threads`, trimmed to the fields discovery reads plus some
/// noise lines found on real machines.
pub(crate) fn cpuinfo_for(threads: &ThreadSet) -> String {
    let mut out = String::new();
    for t in threads {
        let _ = writeln!(out, "processor\t: {}", t.id());
        let _ = writeln!(out, "vendor_id\t: GenuineIntel");
        let _ = writeln!(out, "model name\t: Intel(R) Xeon(R) CPU E5-2699 v4 @ 2.20GHz");
        let _ = writeln!(out, "physical id\t: {}", t.socket());
        let _ = writeln!(out, "siblings\t: 8");
        let _ = writeln!(out, "core id\t\t: {}", t.core().core);
        let _ = writeln!(out, "cpu cores\t: 4");
        let _ = writeln!(out, "flags\t\t: fpu vme de pse tsc msr pae mce cx8 ht");
        out.push('\n');
    }
    out
}
