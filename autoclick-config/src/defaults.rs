//! Per-field default value functions, referenced from `#[serde(default =
//! "...")]` attributes on [`crate::doc::ConfigDoc`].

pub fn fps_max() -> u32 {
    30
}

pub fn threshold() -> f32 {
    0.85
}

pub fn interval_ms() -> u64 {
    100
}

pub fn click_delay_ms() -> u64 {
    500
}

pub fn smart_finder_base_interval_ms() -> u64 {
    1_000
}

pub fn smart_finder_min_interval_ms() -> u64 {
    500
}

pub fn smart_finder_max_interval_ms() -> u64 {
    30_000
}

pub fn max_recovery_attempts() -> u32 {
    5
}

pub fn recovery_cooldown_ms() -> u64 {
    10_000
}

pub fn bool_true() -> bool {
    true
}

pub fn bool_false() -> bool {
    false
}
