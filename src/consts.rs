use crate::Float;

pub const EPSILON: Float = 1e-5;
/// Cutoff below which a pdf or cosine is treated as degenerate
pub const PDF_EPSILON: Float = 1e-6;
pub const INFINITY: Float = std::f64::INFINITY as Float;
pub const MAX: Float = std::f64::MAX as Float;
pub const PI: Float = std::f64::consts::PI as Float;
/// Connections with less total energy than this are dropped
pub const ENERGY_FLOOR: Float = 1e-12;
