//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Grid state model and grid interface boundary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the three feeder phases.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Phase {
    /// Phase A.
    A,
    /// Phase B.
    B,
    /// Phase C.
    C,
}

impl Phase {
    /// All phases in order.
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// Lowercase letter used in publication keys (`Va`, `Sb`, ...).
    pub fn letter(&self) -> char {
        match self {
            Phase::A => 'a',
            Phase::B => 'b',
            Phase::C => 'c',
        }
    }

    /// Resolve the phase a measurement key refers to from its trailing letter.
    ///
    /// `gld_voltage_Va`, `voltage_A` and `power_c` all resolve; keys that do not
    /// end in a phase letter return `None`.
    pub fn from_key(key: &str) -> Option<Phase> {
        match key.chars().last()?.to_ascii_lowercase() {
            'a' => Some(Phase::A),
            'b' => Some(Phase::B),
            'c' => Some(Phase::C),
            _ => None,
        }
    }
}

/// Complex quantity in rectangular form.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Phasor {
    /// Real component.
    pub real: f64,
    /// Imaginary component.
    pub imag: f64,
}

impl Phasor {
    /// Construct from rectangular components.
    pub fn new(real: f64, imag: f64) -> Self {
        Self { real, imag }
    }

    /// Construct from a magnitude and an angle in degrees.
    pub fn from_polar(magnitude: f64, angle_deg: f64) -> Self {
        let theta = angle_deg.to_radians();
        Self {
            real: magnitude * theta.cos(),
            imag: magnitude * theta.sin(),
        }
    }

    /// Apparent power phasor for a magnitude and power factor.
    pub fn from_power_factor(magnitude: f64, power_factor: f64) -> Self {
        let pf = power_factor.clamp(-1.0, 1.0);
        Self {
            real: magnitude * pf,
            imag: magnitude * pf.acos().sin(),
        }
    }

    /// Euclidean magnitude.
    pub fn magnitude(&self) -> f64 {
        self.real.hypot(self.imag)
    }

    /// Angle in degrees.
    pub fn angle_deg(&self) -> f64 {
        self.imag.atan2(self.real).to_degrees()
    }

    /// Scale both components.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.real * factor, self.imag * factor)
    }
}

impl std::ops::Add for Phasor {
    type Output = Phasor;

    fn add(self, rhs: Phasor) -> Phasor {
        Phasor::new(self.real + rhs.real, self.imag + rhs.imag)
    }
}

/// Measured phasor with derived magnitude, angle and power factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhasorReading {
    /// Real component.
    pub real: f64,
    /// Imaginary component.
    pub imag: f64,
    /// `sqrt(real² + imag²)`.
    pub magnitude: f64,
    /// Angle in degrees.
    pub angle: f64,
    /// `real / magnitude`, zero for a zero phasor.
    pub power_factor: f64,
}

impl PhasorReading {
    /// Derive every reading field from a raw phasor.
    pub fn from_phasor(phasor: Phasor) -> Self {
        let magnitude = phasor.magnitude();
        let power_factor = if magnitude > 0.0 {
            phasor.real / magnitude
        } else {
            0.0
        };
        Self {
            real: phasor.real,
            imag: phasor.imag,
            magnitude,
            angle: phasor.angle_deg(),
            power_factor,
        }
    }

    /// The underlying phasor.
    pub fn phasor(&self) -> Phasor {
        Phasor::new(self.real, self.imag)
    }
}

impl From<Phasor> for PhasorReading {
    fn from(phasor: Phasor) -> Self {
        Self::from_phasor(phasor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_resolves_from_key_suffix() {
        assert_eq!(Phase::from_key("gld_voltage_Va"), Some(Phase::A));
        assert_eq!(Phase::from_key("gpk_voltage_Vc"), Some(Phase::C));
        assert_eq!(Phase::from_key("power_B"), Some(Phase::B));
        assert_eq!(Phase::from_key("bus_total"), None);
        assert_eq!(Phase::from_key(""), None);
    }

    #[test]
    fn reading_derives_power_factor_and_angle() {
        let reading = PhasorReading::from_phasor(Phasor::from_power_factor(1_000_000.0, 0.9));
        assert!((reading.magnitude - 1_000_000.0).abs() < 1e-6);
        assert!((reading.power_factor - 0.9).abs() < 1e-9);

        let zero = PhasorReading::from_phasor(Phasor::default());
        assert_eq!(zero.power_factor, 0.0);
    }

    #[test]
    fn polar_construction_keeps_magnitude() {
        let phasor = Phasor::from_polar(2401.78, -120.0);
        assert!((phasor.magnitude() - 2401.78).abs() < 1e-9);
        assert!((phasor.angle_deg() + 120.0).abs() < 1e-9);
    }
}
