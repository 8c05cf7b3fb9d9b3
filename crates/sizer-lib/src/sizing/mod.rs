//! Worker sizing arithmetic
//!
//! Both capacity models share one pattern: work out how much memory is left
//! after the reservation and safety buffer, then divide it by the measured
//! worker size. Every derived count truncates toward zero; nothing here rounds
//! a worker count up.

mod fixed_process;
mod overhead;
mod threaded_worker;

pub use fixed_process::{FixedProcessModel, FixedProcessResult, PoolWarmth};
pub use overhead::{
    OverheadEstimate, OverheadEstimator, PhpCliInspector, RuntimeInspector,
    CACHE_ESTIMATE_MB, DEFAULT_OPCACHE_MB, RUNTIME_ESTIMATE_MB,
};
pub use threaded_worker::{
    CaddyfileSettings, EstimatedMemory, ThreadedWorkerModel, ThreadedWorkerResult, MIN_WORKERS,
};

/// MB per GB
pub const MB_PER_GB: f64 = 1024.0;

/// `max(x, 0)`; NaN is treated as 0
pub fn clamp_non_negative(x: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        0.0
    }
}

/// Round to two decimal places, half away from zero
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Memory left for workers, in GB, rounded to two decimals.
///
/// `(total - reserved) * (1 - buffer / 100)`. Each factor is clamped at zero
/// on its own, so a reservation larger than the host and a buffer above 100%
/// both yield 0 instead of multiplying two negatives into a positive.
pub fn available_memory_gb(total_gb: f64, reserved_gb: f64, buffer_percent: f64) -> f64 {
    let after_reserve = clamp_non_negative(total_gb - reserved_gb);
    let after_buffer = clamp_non_negative(1.0 - buffer_percent / 100.0);
    round2(clamp_non_negative(after_reserve * after_buffer))
}

/// Convert GB to whole MB, rounding to nearest
pub fn gb_to_mb(gb: f64) -> u64 {
    (clamp_non_negative(gb) * MB_PER_GB).round() as u64
}

/// `floor(numerator / denominator)`, or 0 when the denominator is not positive
pub fn integer_divide_floor(numerator: f64, denominator: f64) -> u64 {
    if !(denominator > 0.0) {
        return 0;
    }
    clamp_non_negative((numerator / denominator).floor()) as u64
}
