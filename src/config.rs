use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tuning knobs for one bubble space session. Durations are in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_fps: u32,
    pub double_tap: bool,
    pub double_tap_interval_ms: u64,
    pub long_press_delay_ms: u64,
    pub movement_threshold: f32,
    pub idle_timeout_ms: u64,
    pub maintenance_pulse_ms: u64,
    pub default_diameter: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub placement_attempts: usize,
    pub settle_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_fps: 60,
            double_tap: true,
            double_tap_interval_ms: 500,
            long_press_delay_ms: 600,
            movement_threshold: 10.0,
            idle_timeout_ms: 1000,
            maintenance_pulse_ms: 25,
            default_diameter: 100.0,
            min_radius: 12.0,
            max_radius: 240.0,
            placement_attempts: 24,
            settle_iterations: 16,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid engine config JSON in {}", path.display()))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.max_fps.max(1)))
    }

    pub fn double_tap_interval(&self) -> Duration {
        Duration::from_millis(self.double_tap_interval_ms)
    }

    pub fn long_press_delay(&self) -> Duration {
        Duration::from_millis(self.long_press_delay_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn maintenance_pulse(&self) -> Duration {
        Duration::from_millis(self.maintenance_pulse_ms.max(1))
    }
}
