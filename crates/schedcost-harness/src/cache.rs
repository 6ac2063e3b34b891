//! Cache buffer sweeps and eviction strategies.
//!
//! The cache-fill experiment times full sweeps over a buffer sized to half
//! the L2 capacity, before and after evicting it. Eviction is a capability
//! with two implementations: a user-space per-line flush, and a kernel
//! device whose driver clears the whole cache on open.

use schedcost_common::{CacheFillConfig, EvictorKind, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// The memory region swept by the cache-fill experiment.
#[derive(Debug, Clone)]
pub struct CacheBuffer {
    bytes: Vec<u8>,
}

impl CacheBuffer {
    /// Buffer covering half of `l2_size_bytes`.
    ///
    /// Half, not all: other runnable work shares the cache, and the
    /// historical sizing leaves it the other half of every set.
    #[must_use]
    pub fn half_of_l2(l2_size_bytes: usize) -> Self {
        Self {
            bytes: vec![0u8; l2_size_bytes / 2],
        }
    }

    /// Buffer length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read every byte of the buffer in order.
    ///
    /// Volatile reads keep the loop from collapsing at opt level, and the
    /// running accumulator through `black_box` keeps the loaded values
    /// alive. Byte-granular loads touch every line of every set the
    /// buffer maps to.
    pub fn sweep(&self) -> u8 {
        let mut acc: u8 = 0;
        let ptr = self.bytes.as_ptr();
        for offset in 0..self.bytes.len() {
            // SAFETY: offset stays within the live allocation.
            acc ^= unsafe { std::ptr::read_volatile(ptr.add(offset)) };
        }
        std::hint::black_box(acc)
    }
}

/// Capability to force a buffer's lines out of cache between sweeps.
pub trait CacheEvictor {
    /// Evict `buffer` from the cache hierarchy.
    fn evict(&self, buffer: &CacheBuffer) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Evicts by flushing each of the buffer's cache lines from user space.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlushEvictor;

impl CacheEvictor for FlushEvictor {
    fn evict(&self, buffer: &CacheBuffer) -> Result<()> {
        flush_lines(buffer);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "flush"
    }
}

// Line size is 64 bytes on every x86_64 and on the aarch64 parts this runs
// on; flushing a finer stride would only repeat lines.
const CACHE_LINE_BYTES: usize = 64;

#[cfg(target_arch = "x86_64")]
fn flush_lines(buffer: &CacheBuffer) {
    use std::arch::x86_64::{_mm_clflush, _mm_mfence};

    if buffer.is_empty() {
        return;
    }
    let ptr = buffer.bytes.as_ptr();
    // SAFETY: every flushed address lies within the live allocation; the
    // fences order the flushes against the surrounding timed sweeps.
    unsafe {
        _mm_mfence();
        let mut offset = 0;
        while offset < buffer.bytes.len() {
            _mm_clflush(ptr.add(offset));
            offset += CACHE_LINE_BYTES;
        }
        _mm_mfence();
    }
}

#[cfg(target_arch = "aarch64")]
fn flush_lines(buffer: &CacheBuffer) {
    if buffer.is_empty() {
        return;
    }
    let ptr = buffer.bytes.as_ptr();
    // SAFETY: dc civac is available to user space when the kernel sets
    // SCTLR_EL1.UCI, which Linux does; every address lies within the live
    // allocation.
    unsafe {
        let mut offset = 0;
        while offset < buffer.bytes.len() {
            core::arch::asm!(
                "dc civac, {addr}",
                addr = in(reg) ptr.add(offset),
                options(nostack, preserves_flags)
            );
            offset += CACHE_LINE_BYTES;
        }
        core::arch::asm!("dsb sy", options(nostack, preserves_flags));
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn flush_lines(buffer: &CacheBuffer) {
    // No portable flush instruction: evict by capacity instead, streaming
    // a scratch region several times the buffer size through the cache.
    let scratch = vec![0u8; buffer.len().saturating_mul(8).max(CACHE_LINE_BYTES)];
    let ptr = scratch.as_ptr();
    let mut acc: u8 = 0;
    for offset in 0..scratch.len() {
        // SAFETY: offset stays within the live allocation.
        acc ^= unsafe { std::ptr::read_volatile(ptr.add(offset)) };
    }
    std::hint::black_box(acc);
}

/// Evicts by opening a kernel device whose driver clears the whole cache.
///
/// The open itself triggers the clear; no data crosses the descriptor and
/// it is closed immediately. The settle delay afterwards gives concurrently
/// scheduled work time to refill what the whole-cache clear took from it.
/// The delay is a heuristic, not a synchronization guarantee.
#[derive(Debug, Clone)]
pub struct DeviceEvictor {
    path: PathBuf,
    settle: Duration,
}

impl DeviceEvictor {
    /// Evictor driving the device at `path`, sleeping `settle` after each
    /// clear.
    pub fn new(path: impl Into<PathBuf>, settle: Duration) -> Self {
        Self {
            path: path.into(),
            settle,
        }
    }

    /// Device node this evictor opens.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CacheEvictor for DeviceEvictor {
    fn evict(&self, _buffer: &CacheBuffer) -> Result<()> {
        // Open failure degrades the cold-sweep numbers but does not abort
        // the run.
        match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(device) => drop(device),
            Err(err) => warn!(
                path = %self.path.display(),
                "cache-clear device open failed: {err}"
            ),
        }
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "device"
    }
}

/// Build the evictor the configuration asks for.
#[must_use]
pub fn create_evictor(config: &CacheFillConfig) -> Box<dyn CacheEvictor> {
    match config.evictor {
        EvictorKind::Flush => Box::new(FlushEvictor),
        EvictorKind::Device => Box::new(DeviceEvictor::new(
            config.device_path.clone(),
            config.settle_delay,
        )),
    }
}
