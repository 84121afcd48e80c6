mod cpuinfo;
mod filesystem;

use tracing::{debug, trace};

use crate::{ThreadSet, TopoError, TopoResult};
use filesystem::{Filesystem, HostFilesystem};

/// Enumerate every online hardware thread of the current host.
pub fn discover() -> TopoResult<ThreadSet> {
    Topology::discover().map(Topology::into_threads)
}

/// Immutable snapshot of a machine's CPU hierarchy.
///
/// Rediscovering yields an independent snapshot; nothing is cached between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    threads: ThreadSet,
}

impl Topology {
    /// Read the host topology from `/proc/cpuinfo`, skipping offline processors.
    pub fn discover() -> TopoResult<Self> {
        discover_with(&HostFilesystem)
    }

    /// Build a snapshot from an already known thread set (tests, remote hosts described out of band).
    pub fn from_threads(threads: ThreadSet) -> Self {
        Self { threads }
    }

    #[inline]
    pub fn threads(&self) -> &ThreadSet {
        &self.threads
    }

    pub fn into_threads(self) -> ThreadSet {
        self.threads
    }

    pub fn socket_count(&self) -> usize {
        self.threads.sockets_present().len()
    }

    pub fn core_count(&self) -> usize {
        self.threads.available_cores().len()
    }
}

fn discover_with<F: Filesystem>(fs: &F) -> TopoResult<Topology> {
    let contents = fs
        .get_cpuinfo_contents()
        .map_err(|e| TopoError::Discovery(format!("read /proc/cpuinfo: {e}")))?;

    let mut listed = cpuinfo::parse(&contents)?;
    listed.sort_by_key(|t| t.id());

    let threads: ThreadSet = listed
        .into_iter()
        .filter(|t| is_online(fs, t.id()))
        .collect();
    if threads.is_empty() {
        return Err(TopoError::Discovery("no online processors".into()));
    }

    let topology = Topology { threads };
    debug!(
        target: "kestrel.topo.discover",
        threads = topology.threads.len(),
        cores = topology.core_count(),
        sockets = topology.socket_count(),
        "topology discovered"
    );
    Ok(topology)
}

fn is_online<F: Filesystem>(fs: &F, cpu: u32) -> bool {
    match fs.get_cpu_online_contents(cpu) {
        Some(flag) if flag.trim() == "0" => {
            trace!(target: "kestrel.topo.discover", cpu, "skipping offline processor");
            false
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::Thread;
    use crate::fixtures::{cpuinfo_for, two_socket_topology};
    use filesystem::MockFilesystem;

    fn mock_with_cpuinfo(contents: String) -> MockFilesystem {
        let mut fs = MockFilesystem::new();
        fs.expect_get_cpuinfo_contents()
            .returning(move || Ok(contents.clone()));
        fs
    }

    #[test]
    fn discovers_all_online_threads() {
        let mut fs = mock_with_cpuinfo(cpuinfo_for(&two_socket_topology()));
        fs.expect_get_cpu_online_contents()
            .returning(|_| Some("1\n".to_string()));

        let topology = discover_with(&fs).unwrap();

        assert_eq!(topology.threads().len(), 16);
        assert_eq!(topology.socket_count(), 2);
        assert_eq!(topology.core_count(), 8);
        assert_eq!(topology.threads().ids(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn offline_processors_are_skipped() {
        let mut fs = mock_with_cpuinfo(cpuinfo_for(&two_socket_topology()));
        fs.expect_get_cpu_online_contents()
            .returning(|cpu| match cpu {
                15 => Some("0\n".to_string()),
                0 => None,
                _ => Some("1\n".to_string()),
            });

        let topology = discover_with(&fs).unwrap();

        assert_eq!(topology.threads().len(), 15);
        assert!(topology.threads().contains(&Thread::new(0, 0, 0)));
        assert!(!topology.threads().contains(&Thread::new(15, 3, 1)));
    }

    #[test]
    fn unreadable_cpuinfo_is_a_discovery_error() {
        let mut fs = MockFilesystem::new();
        fs.expect_get_cpuinfo_contents()
            .returning(|| Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));

        let err = discover_with(&fs).unwrap_err();
        assert!(matches!(err, TopoError::Discovery(msg) if msg.contains("denied")));
    }

    #[test]
    fn all_offline_is_a_discovery_error() {
        let mut fs = mock_with_cpuinfo("processor : 0\n".to_string());
        fs.expect_get_cpu_online_contents()
            .returning(|_| Some("0".to_string()));

        assert!(matches!(discover_with(&fs), Err(TopoError::Discovery(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn host_discovery_is_consistent() {
        let first = Topology::discover().unwrap();
        let second = Topology::discover().unwrap();

        assert!(!first.threads().is_empty());
        assert_eq!(first, second);
    }
}
