//! Constants shared by every friction element of an interface.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

use crate::config::{require_positive, Parameters};
use crate::errors::ConfigError;

/// Interface constants for the stick-slip friction elements.
///
/// Thresholds are expressed relative to the mean normal force per sub-spring
/// `fn_avg`, so that the static limit `fs · fn / fn_avg` equals `μs · fn`.
#[derive(Clone, Debug, Serialize)]
pub struct FrictionInfo {
    /// Tangential stiffness of one sub-spring.
    pub k: f64,
    /// Static threshold at the mean normal force.
    pub fs: f64,
    /// Kinetic threshold at the mean normal force.
    pub fk: f64,
    /// Mean normal force carried by one sub-spring.
    pub fn_avg: f64,
    /// Normal stiffness of one sub-spring.
    pub k_normal: f64,
    /// Sub-springs per frictional node.
    pub ns: usize,
    /// Static friction coefficient.
    pub mu_s: f64,
    /// Kinetic friction coefficient.
    pub mu_k: f64,
    /// Mean delay before a detached sub-spring reattaches.
    pub mean_time: f64,
    /// Spread of the reattachment delay.
    pub std_time: f64,
    /// Distribution of the time a detached sub-spring waits before reattaching.
    #[serde(skip)]
    reattach_time: Normal<f64>,
}

impl FrictionInfo {
    /// Build interface constants from the total normal load.
    ///
    /// `normal_load` is spread over `nx` frictional nodes with `ns` sub-springs
    /// each; `k_normal` is the normal stiffness of a whole node and is split
    /// evenly between its sub-springs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for non-positive loads, counts or
    /// stiffnesses and for a negative reattachment spread.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        normal_load: f64,
        nx: usize,
        ns: usize,
        k: f64,
        k_normal: f64,
        mu_s: f64,
        mu_k: f64,
        mean_time: f64,
        std_time: f64,
    ) -> Result<Self, ConfigError> {
        require_positive("fn", normal_load)?;
        require_positive("nx", nx as f64)?;
        require_positive("ns", ns as f64)?;
        require_positive("k", k)?;
        require_positive("kNormal", k_normal)?;
        require_positive("staticCoefficient", mu_s)?;
        require_positive("dynamicCoefficient", mu_k)?;
        let reattach_time = Normal::new(mean_time, std_time).map_err(|_| ConfigError::Invalid {
            name: "stdtime",
            value: std_time,
            reason: "must be finite and non-negative",
        })?;

        let fn_avg = normal_load / (nx * ns) as f64;
        let info = Self {
            k,
            fs: mu_s * fn_avg,
            fk: mu_k * fn_avg,
            fn_avg,
            k_normal: k_normal / ns as f64,
            ns,
            mu_s,
            mu_k,
            mean_time,
            std_time,
            reattach_time,
        };
        log::debug!("{info:?}");
        Ok(info)
    }

    /// Read the interface constants from the parameter set.
    ///
    /// # Errors
    ///
    /// Propagates missing or invalid parameters.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, ConfigError> {
        Self::new(
            parameters.get("fn")?,
            parameters.get("nx")?,
            parameters.get("ns")?,
            parameters.get("k")?,
            parameters.get("kNormal")?,
            parameters.get("staticCoefficient")?,
            parameters.get("dynamicCoefficient")?,
            parameters.get("meantime")?,
            parameters.get("stdtime")?,
        )
    }

    /// Draw one reattachment delay.
    pub fn sample_reattach_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.reattach_time.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn thresholds_scale_with_mean_normal_force() {
        let info = FrictionInfo::new(1920.0, 57, 10, 1.0e6, 4.0e6, 0.4, 0.16, 0.002, 0.0006)
            .expect("valid");
        let fn_avg = 1920.0 / 570.0;
        assert_relative_eq!(info.fn_avg, fn_avg, max_relative = 1.0e-12);
        assert_relative_eq!(info.fs, 0.4 * fn_avg, max_relative = 1.0e-12);
        assert_relative_eq!(info.fk, 0.16 * fn_avg, max_relative = 1.0e-12);
        assert_relative_eq!(info.k_normal, 4.0e5);
    }

    #[test]
    fn zero_spread_draws_the_mean() {
        let info =
            FrictionInfo::new(1.0, 1, 1, 1.0, 1.0, 0.5, 0.2, 0.25, 0.0).expect("valid");
        let mut rng = StdRng::seed_from_u64(7);
        assert_relative_eq!(info.sample_reattach_delay(&mut rng), 0.25);
    }

    #[test]
    fn negative_spread_is_rejected() {
        let error = FrictionInfo::new(1.0, 1, 1, 1.0, 1.0, 0.5, 0.2, 0.25, -1.0)
            .expect_err("negative spread");
        assert!(matches!(error, ConfigError::Invalid { name: "stdtime", .. }));
    }
}
