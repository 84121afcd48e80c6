use std::fmt::Debug;
use std::{fs, io};

/// The slice of the Linux virtual filesystem that topology discovery reads.
///
/// Exists so discovery can be driven by fixed fixtures in tests. All reads are synchronous; the
/// files are generated by the kernel and never hit a storage device.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Filesystem: Debug + Send + Sync + 'static {
    /// Contents of `/proc/cpuinfo`.
    ///
    /// Plaintext "key : value" pairs, one block per processor, blocks separated by empty lines.
    /// Offline processors are listed too.
    fn get_cpuinfo_contents(&self) -> io::Result<String>;

    /// Contents of `/sys/devices/system/cpu/cpu{index}/online` (`0` or `1`), or `None` if the
    /// file is absent, in which case the processor is treated as online.
    fn get_cpu_online_contents(&self, cpu_index: u32) -> Option<String>;
}

/// The filesystem of the host we are running on.
#[derive(Debug, Default)]
pub(crate) struct HostFilesystem;

impl Filesystem for HostFilesystem {
    fn get_cpuinfo_contents(&self) -> io::Result<String> {
        fs::read_to_string("/proc/cpuinfo")
    }

    fn get_cpu_online_contents(&self, cpu_index: u32) -> Option<String> {
        fs::read_to_string(format!("/sys/devices/system/cpu/cpu{cpu_index}/online")).ok()
    }
}
