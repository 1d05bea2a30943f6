//! Monotonic time since boot.
//!
//! On ESP-IDF this wraps `esp_timer_get_time()` (microsecond precision,
//! monotonic); on the host, `std::time::Instant` anchored at first use.
//! Message timestamps are milliseconds in a `u32`, wrapping after ~49
//! days — consumers diff with `wrapping_sub`.

/// Milliseconds since boot, truncated to the wire timestamp width.
pub fn uptime_ms() -> u32 {
    (uptime_us() / 1_000) as u32
}

/// Seconds since boot.
pub fn uptime_secs() -> u64 {
    uptime_us() / 1_000_000
}

#[cfg(target_os = "espidf")]
fn uptime_us() -> u64 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
}

#[cfg(not(target_os = "espidf"))]
fn uptime_us() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_micros() as u64
}
