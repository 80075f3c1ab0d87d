//! CPU binding utilities for runner threads
//!
//! Binding a busy-polling runner to a dedicated core reduces context
//! switching and keeps its latency samples consistent.

#[cfg(not(feature = "cpu-binding"))]
use tracing::warn;

/// Bind current thread to a specific CPU core
pub fn bind_to_cpu_set(cpu_core: usize) -> Result<(), String> {
    #[cfg(feature = "cpu-binding")]
    {
        let core_ids = core_affinity::get_core_ids()
            .ok_or_else(|| "Failed to get CPU core IDs".to_string())?;

        let core_id = *core_ids.get(cpu_core).ok_or_else(|| {
            format!(
                "CPU core {} not available (max: {})",
                cpu_core,
                core_ids.len().saturating_sub(1)
            )
        })?;

        if core_affinity::set_for_current(core_id) {
            tracing::debug!("✅ Bound to CPU core {}", cpu_core);
            Ok(())
        } else {
            Err(format!("Failed to bind to CPU core {cpu_core}"))
        }
    }

    #[cfg(not(feature = "cpu-binding"))]
    {
        warn!("CPU binding disabled (compile with --features cpu-binding), not binding to core {}", cpu_core);
        Ok(())
    }
}

/// Get number of available CPU cores
pub fn get_cpu_count() -> usize {
    #[cfg(feature = "cpu-binding")]
    {
        core_affinity::get_core_ids()
            .map(|cores| cores.len())
            .filter(|&count| count > 0)
            .unwrap_or_else(num_cpus::get)
    }

    #[cfg(not(feature = "cpu-binding"))]
    {
        num_cpus::get()
    }
}

/// Core assignment for the `index`-th spawned runner, wrapping around the
/// available cores.
pub fn core_for_runner(index: usize) -> usize {
    index % get_cpu_count().max(1)
}
