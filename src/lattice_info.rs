//! Effective beam stiffnesses derived from the bulk material.

use serde::Serialize;

use crate::config::{require_positive, Parameters};
use crate::errors::ConfigError;

/// Elastic constants shared by every beam element of a lattice.
///
/// Each lattice link is modelled as a Timoshenko beam with a rectangular cross
/// section of height `d/2` and depth `hZ`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LatticeInfo {
    /// Young's modulus in pascals.
    pub youngs_modulus: f64,
    /// Poisson's ratio.
    pub poisson_ratio: f64,
    /// Lattice spacing (rest length of a link) in metres.
    pub spacing: f64,
    /// Out-of-plane depth in metres.
    pub depth: f64,
    /// Beam height, half the spacing.
    pub height: f64,
    /// Shear modulus in pascals.
    pub shear_modulus: f64,
    /// Cross-sectional area.
    pub area: f64,
    /// Second moment of area.
    pub second_moment: f64,
    /// Shear-correction factor `Φ`.
    pub shear_correction: f64,
    /// Axial stiffness `EA/d`.
    pub kappa_normal: f64,
    /// Transverse stiffness `12EI/(d²(1+Φ))`.
    pub kappa_shear: f64,
}

impl LatticeInfo {
    /// Derive the beam constants from material parameters.
    ///
    /// # Examples
    /// ```
    /// use stickslip::LatticeInfo;
    ///
    /// let info = LatticeInfo::new(3.0e9, 0.33, 0.005, 0.006).expect("valid material");
    /// assert!(info.kappa_normal > info.kappa_shear);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the modulus, spacing or depth is not
    /// positive, or when Poisson's ratio is outside (-1, 0.5].
    pub fn new(
        youngs_modulus: f64,
        poisson_ratio: f64,
        spacing: f64,
        depth: f64,
    ) -> Result<Self, ConfigError> {
        let e = require_positive("E", youngs_modulus)?;
        let d = require_positive("d", spacing)?;
        let h_z = require_positive("hZ", depth)?;
        if !(poisson_ratio > -1.0 && poisson_ratio <= 0.5) {
            return Err(ConfigError::Invalid {
                name: "nu",
                value: poisson_ratio,
                reason: "must lie in (-1, 0.5]",
            });
        }

        let h_y = d / 2.0;
        let g = e / (2.0 * (1.0 + poisson_ratio));
        let area = h_z * h_y;
        let second_moment = h_z * h_y.powi(3) / 12.0;
        let phi = 12.0 * e * second_moment / (g * d * d * area);
        let kappa_shear = 12.0 * e * second_moment / (d * d * (1.0 + phi));
        let kappa_normal = e * area / d;

        let info = Self {
            youngs_modulus: e,
            poisson_ratio,
            spacing: d,
            depth: h_z,
            height: h_y,
            shear_modulus: g,
            area,
            second_moment,
            shear_correction: phi,
            kappa_normal,
            kappa_shear,
        };
        log::debug!("{info:?}");
        Ok(info)
    }

    /// Read `E`, `nu`, `d` and `hZ` from the parameter set.
    ///
    /// # Errors
    ///
    /// Propagates missing or invalid parameters.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, ConfigError> {
        Self::new(
            parameters.get("E")?,
            parameters.get("nu")?,
            parameters.get("d")?,
            parameters.get("hZ")?,
        )
    }

    /// Mass of one lattice node: a disc of diameter `d` and thickness `hZ`.
    #[must_use]
    pub fn node_mass(&self, density: f64) -> f64 {
        density * self.spacing * self.spacing * self.depth / 4.0 * std::f64::consts::PI
    }

    /// Moment of inertia per unit mass of one lattice node.
    #[must_use]
    pub fn node_inertia_factor(&self) -> f64 {
        self.spacing * self.spacing / 8.0
    }
}
