//! Generation parameters.
//!
//! `ConfigParams` is the raw, freely editable bundle (what a form or a JSON
//! request carries). `GenerationConfig` is the validated, immutable result:
//! once built, every field is in range and the direction weights sum to 1.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::grid::Direction;

pub const MIN_DIMENSION: usize = 3;
/// Above this a warning is logged; generation still proceeds.
pub const LARGE_DIMENSION: usize = 1000;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub const PRESETS: [&str; 9] = [
    "tiny",
    "small",
    "medium",
    "large",
    "sparse",
    "dense",
    "linear",
    "vertical",
    "horizontal",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be at least {min}, got {value}", min = MIN_DIMENSION)]
    DimensionTooSmall { field: &'static str, value: usize },
    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    #[error("direction_weights must contain all directions (UP, DOWN, LEFT, RIGHT); missing {0}")]
    MissingDirection(&'static str),
    #[error("unknown direction '{0}' in direction_weights")]
    UnknownDirection(String),
    #[error("weight for {direction} must be between 0.0 and 1.0, got {value}")]
    WeightOutOfRange { direction: &'static str, value: f64 },
    #[error("unknown preset '{0}'; available presets: {list}", list = PRESETS.join(", "))]
    UnknownPreset(String),
}

/// Unvalidated generation parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConfigParams {
    pub width: usize,
    pub height: usize,
    pub decay_factor: f64,
    pub base_prob_factor: f64,
    pub min_room_prob: f64,
    /// Keyed by direction name (`UP`, `DOWN`, `LEFT`, `RIGHT`).
    pub direction_weights: BTreeMap<String, f64>,
}

impl Default for ConfigParams {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            decay_factor: 0.25,
            base_prob_factor: 0.25,
            min_room_prob: 0.05,
            direction_weights: weight_map(0.25, 0.25, 0.25, 0.25),
        }
    }
}

impl ConfigParams {
    pub fn with_size(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_weights(mut self, up: f64, down: f64, left: f64, right: f64) -> Self {
        self.direction_weights = weight_map(up, down, left, right);
        self
    }

    /// Named starting points; callers may still edit fields before `build`.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        let base = |size: usize, factor: f64| Self {
            width: size,
            height: size,
            decay_factor: factor,
            base_prob_factor: factor,
            ..Self::default()
        };

        let params = match name.to_ascii_lowercase().as_str() {
            "tiny" => base(5, 0.3),
            "small" => base(10, 0.25),
            "medium" => base(20, 0.2),
            "large" => base(40, 0.15),
            "sparse" => Self {
                min_room_prob: 0.02,
                ..base(20, 0.1)
            },
            "dense" => Self {
                min_room_prob: 0.1,
                ..base(20, 0.4)
            },
            "linear" => Self::with_size(20, 20).with_weights(0.1, 0.4, 0.1, 0.4),
            "vertical" => Self::with_size(20, 20).with_weights(0.2, 0.4, 0.2, 0.2),
            "horizontal" => Self::with_size(20, 20).with_weights(0.2, 0.2, 0.2, 0.4),
            _ => return Err(ConfigError::UnknownPreset(name.to_string())),
        };
        Ok(params)
    }

    pub fn build(self) -> Result<GenerationConfig, ConfigError> {
        GenerationConfig::new(self)
    }
}

fn weight_map(up: f64, down: f64, left: f64, right: f64) -> BTreeMap<String, f64> {
    [
        (Direction::Up, up),
        (Direction::Down, down),
        (Direction::Left, left),
        (Direction::Right, right),
    ]
    .into_iter()
    .map(|(d, w)| (d.name().to_string(), w))
    .collect()
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { field, value })
    }
}

/// Validated, immutable generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    width: usize,
    height: usize,
    decay_factor: f64,
    base_prob_factor: f64,
    min_room_prob: f64,
    /// Indexed by `Direction::action_index`.
    weights: [f64; 4],
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            decay_factor: 0.25,
            base_prob_factor: 0.25,
            min_room_prob: 0.05,
            weights: [0.25; 4],
        }
    }
}

impl GenerationConfig {
    pub fn new(params: ConfigParams) -> Result<Self, ConfigError> {
        if params.width < MIN_DIMENSION {
            return Err(ConfigError::DimensionTooSmall {
                field: "width",
                value: params.width,
            });
        }
        if params.height < MIN_DIMENSION {
            return Err(ConfigError::DimensionTooSmall {
                field: "height",
                value: params.height,
            });
        }
        if params.width > LARGE_DIMENSION || params.height > LARGE_DIMENSION {
            warn!(
                "Large maze dimensions ({}x{}) may cause performance issues",
                params.height, params.width
            );
        }

        check_probability("decay_factor", params.decay_factor)?;
        check_probability("base_prob_factor", params.base_prob_factor)?;
        check_probability("min_room_prob", params.min_room_prob)?;

        let mut weights = [f64::NAN; 4];
        for (name, &value) in &params.direction_weights {
            let dir = Direction::parse(name)
                .filter(|d| d.name().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| ConfigError::UnknownDirection(name.clone()))?;
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::WeightOutOfRange {
                    direction: dir.name(),
                    value,
                });
            }
            weights[dir.action_index()] = value;
        }
        for dir in Direction::GENERATION_ORDER {
            if weights[dir.action_index()].is_nan() {
                return Err(ConfigError::MissingDirection(dir.name()));
            }
        }

        Ok(Self {
            width: params.width,
            height: params.height,
            decay_factor: params.decay_factor,
            base_prob_factor: params.base_prob_factor,
            min_room_prob: params.min_room_prob,
            weights: normalize_weights(weights),
        })
    }

    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        ConfigParams::preset(name)?.build()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn total_cells(&self) -> usize {
        self.width * self.height
    }

    pub fn decay_factor(&self) -> f64 {
        self.decay_factor
    }

    pub fn base_prob_factor(&self) -> f64 {
        self.base_prob_factor
    }

    pub fn min_room_prob(&self) -> f64 {
        self.min_room_prob
    }

    /// Normalized weight for `dir`.
    pub fn weight(&self, dir: Direction) -> f64 {
        self.weights[dir.action_index()]
    }

    /// Normalized weights in `Direction::GENERATION_ORDER`.
    pub fn generation_weights(&self) -> [f64; 4] {
        Direction::GENERATION_ORDER.map(|d| self.weight(d))
    }

    /// Round-trips back to editable parameters (normalized weights).
    pub fn params(&self) -> ConfigParams {
        ConfigParams {
            width: self.width,
            height: self.height,
            decay_factor: self.decay_factor,
            base_prob_factor: self.base_prob_factor,
            min_room_prob: self.min_room_prob,
            direction_weights: weight_map(
                self.weight(Direction::Up),
                self.weight(Direction::Down),
                self.weight(Direction::Left),
                self.weight(Direction::Right),
            ),
        }
    }
}

/// Scale to sum 1.0; an all-zero vector becomes uniform.
pub fn normalize_weights(mut weights: [f64; 4]) -> [f64; 4] {
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return [0.25; 4];
    }
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        for w in weights.iter_mut() {
            *w /= total;
        }
        debug!("Normalized direction weights, original sum: {total}");
    }
    weights
}
