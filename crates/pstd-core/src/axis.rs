//! Calculation directions, measured quantities, and domain sides.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction along which a spatial derivative is taken.
///
/// Horizontal is the x axis (columns of a field array), vertical is the
/// z axis (rows).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Along x (columns).
    Horizontal,
    /// Along z (rows).
    Vertical,
}

impl Orientation {
    /// Both orientations, horizontal first.
    pub const ALL: [Orientation; 2] = [Orientation::Horizontal, Orientation::Vertical];

    /// Index into per-orientation arrays (horizontal = 0, vertical = 1).
    pub fn index(self) -> usize {
        match self {
            Self::Horizontal => 0,
            Self::Vertical => 1,
        }
    }

    /// The perpendicular orientation.
    pub fn other(self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }

    /// The sides of a domain that lie across this orientation, lower first.
    ///
    /// A horizontal derivative crosses the left and right edges; a
    /// vertical derivative crosses the top and bottom edges.
    pub fn sides(self) -> [Side; 2] {
        match self {
            Self::Horizontal => [Side::Left, Side::Right],
            Self::Vertical => [Side::Top, Side::Bottom],
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horizontal => write!(f, "horizontal"),
            Self::Vertical => write!(f, "vertical"),
        }
    }
}

/// Which physical quantity a derivative pass differentiates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Pressure (`p0`), feeding the velocity update.
    Pressure,
    /// Particle velocity (`u0` or `w0`), feeding the pressure update.
    Velocity,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pressure => write!(f, "pressure"),
            Self::Velocity => write!(f, "velocity"),
        }
    }
}

/// The four derivative passes of a sub-stage, in dispatch order.
pub const DERIVATIVE_PASSES: [(Orientation, Quantity); 4] = [
    (Orientation::Horizontal, Quantity::Pressure),
    (Orientation::Vertical, Quantity::Pressure),
    (Orientation::Horizontal, Quantity::Velocity),
    (Orientation::Vertical, Quantity::Velocity),
];

/// One edge of a rectangular domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Lower x edge.
    Left,
    /// Upper x edge.
    Right,
    /// Lower z edge.
    Top,
    /// Upper z edge.
    Bottom,
}

impl Side {
    /// All sides in a fixed order.
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Top, Side::Bottom];

    /// The orientation whose derivatives cross this side.
    pub fn orientation(self) -> Orientation {
        match self {
            Self::Left | Self::Right => Orientation::Horizontal,
            Self::Top | Self::Bottom => Orientation::Vertical,
        }
    }

    /// The side facing this one on an adjacent domain.
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }

    /// `true` for the lower-coordinate side of its orientation.
    pub fn is_lower(self) -> bool {
        matches!(self, Self::Left | Self::Top)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}
