//! Stick-slip friction element made of independent tangential sub-springs.

use std::sync::Arc;

use rand::rngs::StdRng;

use crate::friction_info::FrictionInfo;
use crate::geometry::{vector, Vector3};

/// State of one sub-spring under a frictional node.
#[derive(Clone, Debug, PartialEq)]
pub struct SubSpring {
    /// Anchor position along the interface.
    pub x0: f64,
    /// Whether the sub-spring is stuck to the interface.
    pub connected: bool,
    /// Tangential stiffness.
    pub k: f64,
    /// Static threshold at the mean normal force.
    pub fs: f64,
    /// Kinetic threshold at the mean normal force.
    pub fk: f64,
    /// Time after which a detached sub-spring reattaches.
    pub t_reattach: f64,
}

/// A stick-slip friction element attached to one bottom node.
///
/// Each of the `ns` sub-springs carries a normal force proportional to the
/// node's penetration below `y = 0` and a tangential force that scales with
/// `sqrt(fn / fn_avg)`. A stuck sub-spring whose tangential force exceeds the
/// static limit detaches, slides at the kinetic limit and reattaches after a
/// normally distributed delay.
#[derive(Clone, Debug)]
pub struct SpringFriction {
    info: Arc<FrictionInfo>,
    springs: Vec<SubSpring>,
    connected_count: usize,
    normal_force: f64,
    shear_force: f64,
}

impl SpringFriction {
    /// Create an element sharing the given interface constants.
    ///
    /// Sub-springs are allocated when the element is attached to a node.
    #[must_use]
    pub fn new(info: Arc<FrictionInfo>) -> Self {
        Self {
            info,
            springs: Vec::new(),
            connected_count: 0,
            normal_force: 0.0,
            shear_force: 0.0,
        }
    }

    /// Anchor every sub-spring at `x`, all connected.
    pub fn initialize(&mut self, x: f64) {
        let info = &self.info;
        self.springs = (0..info.ns)
            .map(|_| SubSpring {
                x0: x,
                connected: true,
                k: info.k,
                fs: info.fs,
                fk: info.fk,
                t_reattach: 0.0,
            })
            .collect();
        self.connected_count = self.springs.len();
    }

    /// Interface constants.
    #[must_use]
    pub fn info(&self) -> &FrictionInfo {
        &self.info
    }

    /// Sub-spring states.
    #[must_use]
    pub fn springs(&self) -> &[SubSpring] {
        &self.springs
    }

    /// Number of currently connected sub-springs.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.connected_count
    }

    /// Normal force summed over sub-springs in the last evaluation.
    #[must_use]
    pub fn normal_force(&self) -> f64 {
        self.normal_force
    }

    /// Tangential force summed over sub-springs in the last evaluation.
    #[must_use]
    pub fn shear_force(&self) -> f64 {
        self.shear_force
    }

    /// Advance every sub-spring and return the resultant force on the node.
    ///
    /// While `locked` no sub-spring may detach.
    pub fn evaluate(&mut self, position: &Vector3, time: f64, locked: bool, rng: &mut StdRng) -> Vector3 {
        let (x, y) = (position.x, position.y);
        let info = Arc::clone(&self.info);
        let mut resultant = Vector3::zeros();
        self.normal_force = 0.0;
        self.shear_force = 0.0;

        for spring in &mut self.springs {
            if y >= 0.0 {
                if locked {
                    spring.x0 = x;
                } else if spring.connected {
                    spring.connected = false;
                    self.connected_count -= 1;
                }
                continue;
            }

            let fn_i = -y * info.k_normal;
            let load = fn_i / info.fn_avg;
            let mut ft = -(x - spring.x0) * spring.k * load.sqrt();

            if spring.connected {
                if ft.abs() > spring.fs * load && !locked {
                    spring.connected = false;
                    ft = ft.signum() * spring.fk * load;
                    spring.x0 = x + ft / spring.k / load.sqrt();
                    spring.t_reattach = time + info.sample_reattach_delay(rng);
                    self.connected_count -= 1;
                }
            } else {
                if ft.abs() > spring.fk * load {
                    ft = ft.signum() * spring.fk * load;
                    spring.x0 = x + ft / spring.k / load.sqrt();
                }
                if time > spring.t_reattach {
                    spring.connected = true;
                    spring.x0 = x;
                    self.connected_count += 1;
                }
            }

            resultant += vector(ft, fn_i);
            self.normal_force += fn_i;
            self.shear_force += ft;
        }
        resultant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    // One sub-spring with fn_avg = 1, k_normal = 1, fs = 0.5, fk = 0.2.
    fn single_spring(mean_time: f64) -> SpringFriction {
        let info = FrictionInfo::new(1.0, 1, 1, 10.0, 1.0, 0.5, 0.2, mean_time, 0.0)
            .expect("valid friction constants");
        let mut friction = SpringFriction::new(Arc::new(info));
        friction.initialize(0.0);
        friction
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn initialization_connects_every_sub_spring() {
        let info = FrictionInfo::new(10.0, 2, 5, 1.0, 1.0, 0.5, 0.2, 1.0, 0.1).expect("valid");
        let mut friction = SpringFriction::new(Arc::new(info));
        friction.initialize(0.3);
        assert_eq!(friction.connected_count(), 5);
        assert!(friction.springs().iter().all(|s| s.connected && s.x0 == 0.3));
    }

    #[test]
    fn detaches_when_static_threshold_is_first_exceeded() {
        let mut friction = single_spring(1.0);
        let mut rng = rng();
        // At y = -1 the load ratio is 1, so ft = -10 x and the limit is 0.5.
        let mut detached_at = None;
        for step in 1..=100 {
            let x = step as f64 * 0.001;
            let force = friction.evaluate(&vector(x, -1.0), 0.0, false, &mut rng);
            if friction.connected_count() == 0 {
                assert!(10.0 * x > 0.5);
                assert!(10.0 * (x - 0.001) <= 0.5 + 1.0e-12);
                assert_relative_eq!(force.x, -0.2, max_relative = 1.0e-12);
                assert_relative_eq!(force.y, 1.0);
                detached_at = Some(x);
                break;
            }
            assert_relative_eq!(force.x, -10.0 * x, max_relative = 1.0e-12);
        }
        let x = detached_at.expect("spring should detach");
        // The anchor is moved so that the clamped force is elastic.
        assert_relative_eq!(friction.springs()[0].x0, x - 0.02, max_relative = 1.0e-12);
        assert_relative_eq!(friction.springs()[0].t_reattach, 1.0);
    }

    #[test]
    fn reattaches_only_after_scheduled_time() {
        let mut friction = single_spring(0.5);
        let mut rng = rng();
        friction.evaluate(&vector(1.0, -1.0), 0.0, false, &mut rng);
        assert_eq!(friction.connected_count(), 0);

        friction.evaluate(&vector(1.1, -1.0), 0.25, false, &mut rng);
        friction.evaluate(&vector(1.2, -1.0), 0.5, false, &mut rng);
        assert_eq!(friction.connected_count(), 0);

        friction.evaluate(&vector(1.3, -1.0), 0.51, false, &mut rng);
        assert_eq!(friction.connected_count(), 1);
        assert!(friction.springs()[0].connected);
        assert_relative_eq!(friction.springs()[0].x0, 1.3);
    }

    #[test]
    fn sliding_force_is_limited_to_kinetic_threshold() {
        let mut friction = single_spring(10.0);
        let mut rng = rng();
        friction.evaluate(&vector(1.0, -1.0), 0.0, false, &mut rng);
        let force = friction.evaluate(&vector(2.0, -1.0), 0.1, false, &mut rng);
        assert_relative_eq!(force.x, -0.2, max_relative = 1.0e-12);
        assert_relative_eq!(friction.shear_force(), -0.2, max_relative = 1.0e-12);
    }

    #[test]
    fn locked_springs_never_detach() {
        let mut friction = single_spring(0.0);
        let mut rng = rng();
        let force = friction.evaluate(&vector(5.0, -1.0), 0.0, true, &mut rng);
        assert_eq!(friction.connected_count(), 1);
        assert_relative_eq!(force.x, -50.0);

        friction.evaluate(&vector(5.0, 0.5), 0.0, true, &mut rng);
        assert_eq!(friction.connected_count(), 1);
        assert_relative_eq!(friction.springs()[0].x0, 5.0);
    }

    #[test]
    fn lifted_node_detaches_and_carries_no_load() {
        let mut friction = single_spring(1.0);
        let mut rng = rng();
        let force = friction.evaluate(&vector(0.1, 0.01), 0.0, false, &mut rng);
        assert_eq!(force, Vector3::zeros());
        assert_eq!(friction.connected_count(), 0);
        assert_eq!(friction.normal_force(), 0.0);
    }

    #[test]
    fn normal_force_scales_with_penetration() {
        let info = FrictionInfo::new(4.0, 1, 4, 1.0, 8.0, 0.5, 0.2, 1.0, 0.0).expect("valid");
        let mut friction = SpringFriction::new(Arc::new(info));
        friction.initialize(0.0);
        let force = friction.evaluate(&vector(0.0, -0.5), 0.0, false, &mut rng());
        // k_normal per sub-spring = 2, four sub-springs.
        assert_relative_eq!(force.y, 4.0);
        assert_relative_eq!(friction.normal_force(), 4.0);
    }
}
