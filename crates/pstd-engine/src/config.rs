//! Solver configuration, validation, and error types.
//!
//! [`SolverConfig`] holds the immutable per-run parameters.
//! [`validate()`](SolverConfig::validate) checks them before any backend
//! resource is acquired; the scheduler refuses to start otherwise.

use serde::{Deserialize, Serialize};

// ── RkCoefficients ─────────────────────────────────────────────────

/// Number of Runge-Kutta sub-stages per frame.
pub const STAGE_COUNT: usize = 6;

/// Per-stage coefficients of the low-storage Runge-Kutta scheme.
///
/// The default is the optimised six-stage scheme of Bogey and Bailly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RkCoefficients(pub [f64; STAGE_COUNT]);

impl Default for RkCoefficients {
    fn default() -> Self {
        Self([
            0.117_979_901_628_82,
            0.184_646_966_494_48,
            0.246_623_604_309_59,
            0.331_839_542_537_62,
            0.5,
            1.0,
        ])
    }
}

impl RkCoefficients {
    /// Coefficient of one stage.
    pub fn stage(&self, stage: usize) -> f64 {
        self.0[stage]
    }
}

// ── BackendKind / UpdatePlacement ──────────────────────────────────

/// Which execution backend runs the phases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Domains in registration order on the calling thread.
    #[default]
    Sequential,
    /// A fixed-size thread pool.
    SharedMemory,
    /// An accelerator device with a run-scoped context and stream.
    Accelerator,
    /// Independent workers owning disjoint domain subsets.
    Distributed,
}

/// Where the accelerator backend applies the update formulas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePlacement {
    /// On the device.
    #[default]
    Device,
    /// Repatriated to host memory.
    Host,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`SolverConfig::validate()`] or while parsing.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `frame_count` is zero.
    #[error("frame_count must be at least 1")]
    NoFrames,
    /// `dt` is NaN, infinite, zero, or negative.
    #[error("dt must be finite and positive, got {value}")]
    InvalidTimeStep {
        /// The rejected value.
        value: f64,
    },
    /// `wave_speed` is NaN, infinite, zero, or negative.
    #[error("wave_speed must be finite and positive, got {value}")]
    InvalidWaveSpeed {
        /// The rejected value.
        value: f64,
    },
    /// A stage coefficient is non-finite or outside `(0, 1]`.
    #[error("rk coefficient for stage {stage} must lie in (0, 1], got {value}")]
    InvalidCoefficient {
        /// Zero-based stage index.
        stage: usize,
        /// The rejected value.
        value: f64,
    },
    /// `checkpoint_cadence` is zero.
    #[error("checkpoint_cadence must be at least 1")]
    ZeroCheckpointCadence,
    /// The configuration text could not be parsed.
    #[error("config parse failed: {reason}")]
    Parse {
        /// Parser message.
        reason: String,
    },
}

// ── SolverConfig ───────────────────────────────────────────────────

/// Complete configuration for one run.
///
/// Missing keys take their [`Default`] values when deserialising.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Number of frames to compute.
    pub frame_count: u64,
    /// Runge-Kutta time step in seconds.
    pub dt: f64,
    /// Per-stage integration coefficients.
    pub rk_coefficients: RkCoefficients,
    /// Speed of sound (`c1`) in m/s. Default: 340.
    pub wave_speed: f64,
    /// Checkpoint every Nth frame, starting at frame 0. Default: 1.
    pub checkpoint_cadence: u64,
    /// Execution backend.
    pub backend: BackendKind,
    /// Shared-memory pool size. `None` = auto-detect
    /// (`available_parallelism / 2`, clamped to `[2, 16]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<usize>,
    /// Distributed worker count, resolved like `pool_size`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<usize>,
    /// Where the accelerator backend applies updates.
    pub update_placement: UpdatePlacement,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            frame_count: 100,
            dt: Self::courant_dt(0.2, 0.5, 340.0),
            rk_coefficients: RkCoefficients::default(),
            wave_speed: 340.0,
            checkpoint_cadence: 1,
            backend: BackendKind::Sequential,
            pool_size: None,
            worker_count: None,
            update_placement: UpdatePlacement::Device,
        }
    }
}

impl SolverConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_count == 0 {
            return Err(ConfigError::NoFrames);
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::InvalidTimeStep { value: self.dt });
        }
        if !(self.wave_speed.is_finite() && self.wave_speed > 0.0) {
            return Err(ConfigError::InvalidWaveSpeed {
                value: self.wave_speed,
            });
        }
        for (stage, &value) in self.rk_coefficients.0.iter().enumerate() {
            if !(value.is_finite() && value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidCoefficient { stage, value });
            }
        }
        if self.checkpoint_cadence == 0 {
            return Err(ConfigError::ZeroCheckpointCadence);
        }
        Ok(())
    }

    /// Resolved shared-memory pool size.
    pub fn resolved_pool_size(&self) -> usize {
        resolve_parallelism(self.pool_size)
    }

    /// Resolved distributed worker count.
    pub fn resolved_worker_count(&self) -> usize {
        resolve_parallelism(self.worker_count)
    }

    /// Whether frame `frame` (0-based) gets a checkpoint.
    pub fn is_checkpoint_frame(&self, frame: u64) -> bool {
        frame % self.checkpoint_cadence.max(1) == 0
    }

    /// Time step satisfying the Courant condition `c·dt/dx = cfl`.
    pub fn courant_dt(grid_spacing: f64, cfl: f64, wave_speed: f64) -> f64 {
        cfl * grid_spacing / wave_speed
    }

    /// Number of whole frames that fit in `render_time` seconds.
    pub fn frames_for_duration(render_time: f64, dt: f64) -> u64 {
        let frames = (render_time / dt).floor();
        if frames.is_finite() && frames > 0.0 {
            frames as u64
        } else {
            0
        }
    }
}

/// Explicit values are clamped to `[1, 64]`; `None` auto-detects.
fn resolve_parallelism(requested: Option<usize>) -> usize {
    match requested {
        Some(n) => n.clamp(1, 64),
        None => {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            (cpus / 2).clamp(2, 16)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SolverConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.rk_coefficients.stage(STAGE_COUNT - 1), 1.0);
    }

    #[test]
    fn zero_frames_rejected() {
        let config = SolverConfig {
            frame_count: 0,
            ..SolverConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoFrames));
    }

    #[test]
    fn non_finite_dt_rejected() {
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = SolverConfig {
                dt,
                ..SolverConfig::default()
            };
            match config.validate() {
                Err(ConfigError::InvalidTimeStep { .. }) => {}
                other => panic!("expected InvalidTimeStep for {dt}, got {other:?}"),
            }
        }
    }

    #[test]
    fn zero_cadence_rejected() {
        let config = SolverConfig {
            checkpoint_cadence: 0,
            ..SolverConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCheckpointCadence));
    }

    #[test]
    fn bad_coefficient_names_its_stage() {
        let mut rk = RkCoefficients::default();
        rk.0[3] = 1.5;
        let config = SolverConfig {
            rk_coefficients: rk,
            ..SolverConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidCoefficient {
                stage: 3,
                value: 1.5
            })
        );
    }

    #[test]
    fn parallelism_resolution_clamps() {
        let mut config = SolverConfig {
            pool_size: Some(0),
            worker_count: Some(500),
            ..SolverConfig::default()
        };
        assert_eq!(config.resolved_pool_size(), 1);
        assert_eq!(config.resolved_worker_count(), 64);
        config.pool_size = None;
        let auto = config.resolved_pool_size();
        assert!((2..=16).contains(&auto));
    }

    #[test]
    fn checkpoint_frames_follow_cadence() {
        let config = SolverConfig {
            checkpoint_cadence: 3,
            ..SolverConfig::default()
        };
        let frames: Vec<u64> = (0..10).filter(|&f| config.is_checkpoint_frame(f)).collect();
        assert_eq!(frames, vec![0, 3, 6, 9]);
    }

    #[test]
    fn helpers_match_kernel_metadata() {
        let dt = SolverConfig::courant_dt(0.2, 0.5, 340.0);
        assert!((dt - 0.1 / 340.0).abs() < 1e-18);
        assert_eq!(SolverConfig::frames_for_duration(1.0, 0.3), 3);
        assert_eq!(SolverConfig::frames_for_duration(0.0, 0.3), 0);
        assert_eq!(SolverConfig::frames_for_duration(1.0, 0.0), 0);
    }

    #[test]
    fn toml_round_trip() {
        let text = r#"
            frame_count = 12
            dt = 0.0001
            wave_speed = 343.0
            checkpoint_cadence = 4
            backend = "shared_memory"
            pool_size = 3
        "#;
        let config = SolverConfig::from_toml(text).unwrap();
        assert_eq!(config.frame_count, 12);
        assert_eq!(config.backend, BackendKind::SharedMemory);
        assert_eq!(config.pool_size, Some(3));
        assert_eq!(config.rk_coefficients, RkCoefficients::default());
        let back = SolverConfig::from_toml(&toml::to_string(&config).unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn toml_rejects_wrong_stage_count() {
        let text = "rk_coefficients = [0.5, 1.0]";
        match SolverConfig::from_toml(text) {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn explicit_parallelism_is_clamped(n in 0usize..1000) {
                let config = SolverConfig {
                    pool_size: Some(n),
                    worker_count: Some(n),
                    ..SolverConfig::default()
                };
                prop_assert_eq!(config.resolved_pool_size(), n.clamp(1, 64));
                prop_assert_eq!(config.resolved_worker_count(), n.clamp(1, 64));
            }

            #[test]
            fn checkpoint_frames_are_multiples(cadence in 1u64..20, frame in 0u64..1000) {
                let config = SolverConfig {
                    checkpoint_cadence: cadence,
                    ..SolverConfig::default()
                };
                prop_assert_eq!(config.is_checkpoint_frame(frame), frame % cadence == 0);
            }
        }
    }
}
