//! Memory locking utilities
//!
//! Keeps long-lived key material (the store's derived encryption key) out of
//! swap, and disables core dumps at startup.

use crate::errors::{CustodyError, Result};
use tracing::{debug, warn};
use zeroize::Zeroize;

/// Check if we can lock memory (requires appropriate privileges or rlimits)
pub fn can_lock_memory() -> bool {
    #[cfg(target_os = "linux")]
    {
        use nix::sys::resource::{getrlimit, Resource};

        match getrlimit(Resource::RLIMIT_MEMLOCK) {
            Ok((soft, _hard)) => soft > 0,
            Err(_) => false,
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        cfg!(unix)
    }
}

/// Page-aligned span covering `len` bytes at `ptr`
#[cfg(unix)]
fn page_span(ptr: *const u8, len: usize) -> (usize, usize) {
    use nix::libc;

    // SAFETY: sysconf has no preconditions
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    let addr = ptr as usize;
    let aligned_addr = addr & !(page_size - 1);
    let offset = addr - aligned_addr;
    let aligned_len = (len + offset + page_size - 1) & !(page_size - 1);
    (aligned_addr, aligned_len)
}

/// Lock a memory region to prevent it from being swapped
///
/// # Safety
/// The memory region must be valid for `len` bytes
pub unsafe fn lock_memory(ptr: *const u8, len: usize) -> Result<()> {
    if ptr.is_null() || len == 0 {
        return Ok(());
    }

    #[cfg(unix)]
    {
        let (addr, aligned_len) = page_span(ptr, len);
        match nix::sys::mman::mlock(addr as *const nix::libc::c_void, aligned_len) {
            Ok(()) => {
                debug!("Locked {} bytes of memory", aligned_len);
                Ok(())
            }
            Err(e) => Err(CustodyError::InternalError(format!("mlock failed: {}", e))),
        }
    }

    #[cfg(not(unix))]
    {
        warn!("Memory locking not supported on this platform");
        Ok(())
    }
}

/// Unlock a previously locked memory region
///
/// # Safety
/// The memory region must have been locked with `lock_memory`
pub unsafe fn unlock_memory(ptr: *const u8, len: usize) -> Result<()> {
    if ptr.is_null() || len == 0 {
        return Ok(());
    }

    #[cfg(unix)]
    {
        let (addr, aligned_len) = page_span(ptr, len);
        nix::sys::mman::munlock(addr as *const nix::libc::c_void, aligned_len)
            .map_err(|e| CustodyError::InternalError(format!("munlock failed: {}", e)))
    }

    #[cfg(not(unix))]
    {
        Ok(())
    }
}

/// A fixed-size buffer that is locked (when possible) and zeroed on drop
pub struct LockedMemory {
    data: Vec<u8>,
    locked: bool,
}

impl LockedMemory {
    /// Take ownership of `data`, locking it when `lock` is set
    pub fn from_vec(data: Vec<u8>, lock: bool) -> Self {
        let locked = lock
            && match unsafe { lock_memory(data.as_ptr(), data.len()) } {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not lock memory, continuing without: {}", e);
                    false
                }
            };

        Self { data, locked }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for LockedMemory {
    fn drop(&mut self) {
        let (ptr, len) = (self.data.as_ptr(), self.data.len());
        self.data.as_mut_slice().zeroize();

        if self.locked {
            unsafe {
                let _ = unlock_memory(ptr, len);
            }
        }
    }
}

/// Set up memory protection for the process
/// Call this early in main()
pub fn setup_memory_protection(disable_core_dumps: bool) {
    #[cfg(target_os = "linux")]
    {
        use nix::sys::resource::{setrlimit, Resource};

        if disable_core_dumps {
            match setrlimit(Resource::RLIMIT_CORE, 0, 0) {
                Ok(()) => debug!("Core dumps disabled"),
                Err(e) => warn!("Could not disable core dumps: {}", e),
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    let _ = disable_core_dumps;

    if can_lock_memory() {
        debug!("Memory locking is available");
    } else {
        warn!("Memory locking may not be available - consider increasing RLIMIT_MEMLOCK");
    }
}
