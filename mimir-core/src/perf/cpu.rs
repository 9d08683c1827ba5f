//! CPU affinity and thread priority
//!
//! The hot threads (engine, feed handlers, gateways) are pinned to
//! configured cores and, where the platform allows it, promoted to the
//! real-time scheduling class to keep latency jitter down.

use anyhow::Result;
use core_affinity::CoreId;

/// Pin the current thread to a specific CPU core.
///
/// Prevents the OS from migrating the thread between cores, which would
/// cost cache refills and latency spikes.
pub fn pin_to_core(core: usize) -> Result<()> {
    let core_id = CoreId { id: core };

    if core_affinity::set_for_current(core_id) {
        tracing::info!("pinned thread to CPU core {}", core);
        Ok(())
    } else {
        anyhow::bail!("failed to pin thread to core {}", core)
    }
}

/// Set real-time thread priority (Linux only).
///
/// Requires CAP_SYS_NICE or root. Uses SCHED_FIFO.
#[cfg(target_os = "linux")]
pub fn set_realtime_priority(priority: i32) -> Result<()> {
    use libc::{sched_param, sched_setscheduler, SCHED_FIFO};

    unsafe {
        let param = sched_param {
            sched_priority: priority,
        };

        if sched_setscheduler(0, SCHED_FIFO, &param) == 0 {
            tracing::info!("set thread priority to SCHED_FIFO:{}", priority);
            Ok(())
        } else {
            anyhow::bail!("failed to set thread priority (may need CAP_SYS_NICE or root)")
        }
    }
}

/// Set real-time thread priority (non-Linux platforms): no-op with a
/// warning.
#[cfg(not(target_os = "linux"))]
pub fn set_realtime_priority(_priority: i32) -> Result<()> {
    tracing::warn!("real-time priority setting not supported on this platform");
    Ok(())
}

/// Number of available CPU cores.
pub fn num_cores() -> usize {
    core_affinity::get_core_ids()
        .map(|ids| ids.len())
        .unwrap_or(1)
}

/// Pin to an isolated core and raise scheduling priority in one call.
pub fn optimize_hot_thread(core: usize, priority: i32) -> Result<()> {
    pin_to_core(core)?;
    set_realtime_priority(priority)?;

    tracing::info!("thread tuned: core={}, priority={}", core, priority);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_cores() {
        assert!(num_cores() > 0);
    }

    #[test]
    fn test_pin_to_core_does_not_panic() {
        // Pinning may fail without permissions or on exotic platforms;
        // it must report the failure instead of panicking.
        let _ = pin_to_core(0);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_realtime_priority_does_not_panic() {
        let _ = set_realtime_priority(1);
    }
}
