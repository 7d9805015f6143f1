//! Distance engine: Haversine distance adjusted by a travel-mode multiplier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{haversine_km, Coordinates};

/// Kilometres to statute miles.
pub const KM_TO_MILES: f64 = 0.621371;

/// Travel modes supported by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    /// Straight line between the two points.
    #[default]
    Direct,
    Walking,
    Driving,
}

impl TravelMode {
    pub const ALL: [TravelMode; 3] = [TravelMode::Direct, TravelMode::Walking, TravelMode::Driving];

    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Direct => "direct",
            TravelMode::Walking => "walking",
            TravelMode::Driving => "driving",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(TravelMode::Direct),
            "walking" => Ok(TravelMode::Walking),
            "driving" => Ok(TravelMode::Driving),
            _ => Err(Error::UnsupportedMode {
                mode: s.to_string(),
            }),
        }
    }
}

/// Per-mode distance multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    pub direct: f64,
    pub walking: f64,
    pub driving: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            direct: 1.2,
            walking: 1.4,
            driving: 1.1,
        }
    }
}

impl Multipliers {
    /// Largest accepted multiplier; keeps every distance well inside `f64` range.
    pub const MAX: f64 = 1_000.0;

    /// Multiplier applied to the great-circle distance for `mode`.
    pub fn for_mode(&self, mode: TravelMode) -> f64 {
        match mode {
            TravelMode::Direct => self.direct,
            TravelMode::Walking => self.walking,
            TravelMode::Driving => self.driving,
        }
    }

    pub(crate) fn set(&mut self, mode: TravelMode, value: f64) {
        match mode {
            TravelMode::Direct => self.direct = value,
            TravelMode::Walking => self.walking = value,
            TravelMode::Driving => self.driving = value,
        }
    }

    /// Every multiplier must be finite, strictly positive and at most [`Self::MAX`].
    pub fn validate(&self) -> Result<()> {
        for mode in TravelMode::ALL {
            let value = self.for_mode(mode);
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfiguration {
                    message: format!("{mode} multiplier must be a positive number, got {value}"),
                });
            }
            if value > Self::MAX {
                return Err(Error::InvalidConfiguration {
                    message: format!(
                        "{mode} multiplier must not exceed {}, got {value}",
                        Self::MAX
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Unit in which the calculator reports distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Km,
    Mi,
}

impl DistanceUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceUnit::Km => "km",
            DistanceUnit::Mi => "mi",
        }
    }

    /// Convert a kilometre value into this unit.
    pub fn from_km(self, km: f64) -> f64 {
        match self {
            DistanceUnit::Km => km,
            DistanceUnit::Mi => km * KM_TO_MILES,
        }
    }

    /// Convert a value expressed in this unit back into kilometres.
    pub fn to_km(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Km => value,
            DistanceUnit::Mi => value / KM_TO_MILES,
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "km" => Ok(DistanceUnit::Km),
            "mi" => Ok(DistanceUnit::Mi),
            other => Err(Error::InvalidConfiguration {
                message: format!("unknown distance unit '{other}'; expected km or mi"),
            }),
        }
    }
}

/// Great-circle distance between two points scaled by the mode multiplier, in kilometres.
///
/// The result is non-negative, symmetric in `origin`/`destination`, and
/// deterministic for a given set of multipliers.
pub fn calculate_distance(
    origin: &Coordinates,
    destination: &Coordinates,
    mode: TravelMode,
    multipliers: &Multipliers,
) -> Result<f64> {
    multipliers.validate()?;
    let distance = haversine_km(origin, destination) * multipliers.for_mode(mode);
    if !distance.is_finite() {
        return Err(Error::InvalidConfiguration {
            message: format!("{mode} multiplier produced a non-finite distance"),
        });
    }
    Ok(distance)
}

/// Round to two decimal places, the precision stored for calculations.
pub fn round_distance(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
