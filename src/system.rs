//! A loaded block on a frictional interface, assembled from parameters.

use std::sync::Arc;

use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::config::{require_positive, Parameters};
use crate::driver_beam::DriverBeamParameters;
use crate::errors::{ConfigError, SetupError};
use crate::friction_info::FrictionInfo;
use crate::geometry::vector;
use crate::lattice::Lattice;
use crate::lattice_info::LatticeInfo;
use crate::modifiers::{ForceModifier, StraightenerForce};
use crate::output::DataPacket;
use crate::scanner::ScannedLattice;
use crate::spring_friction::SpringFriction;

/// Loading and damping settings of a [`FrictionSystem`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SystemParameters {
    /// Columns of the lattice.
    pub nx: usize,
    /// Rows of the lattice.
    pub ny: usize,
    /// Material density.
    pub density: f64,
    /// Total normal load on the top row.
    pub normal_load: f64,
    /// Scale of the relative velocity damping.
    pub relative_damping: f64,
    /// Angular velocity damping coefficient.
    pub alpha: f64,
    /// Driving velocity of pushers.
    pub drive_velocity: f64,
    /// Pusher stiffness; required for side loading.
    pub pusher_k: Option<f64>,
    /// Straightener stiffness; no straightener when absent.
    pub straightener_k: Option<f64>,
    /// Driver beam settings; side loading when absent.
    pub driver: Option<DriverBeamParameters>,
}

impl SystemParameters {
    /// Read the loading settings.
    ///
    /// A driver beam is configured when `beamMass` is present.
    ///
    /// # Errors
    ///
    /// Propagates missing or mistyped parameters.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, ConfigError> {
        let driver = if parameters.contains("beamMass") {
            Some(DriverBeamParameters::from_parameters(parameters)?)
        } else {
            None
        };
        Ok(Self {
            nx: parameters.get("nx")?,
            ny: parameters.get("ny")?,
            density: require_positive("density", parameters.get("density")?)?,
            normal_load: parameters.get("fn")?,
            relative_damping: parameters.get("relVelDampCoeff")?,
            alpha: parameters.get("alpha")?,
            drive_velocity: parameters.get("vD")?,
            pusher_k: parameters.get_or("pK", None)?,
            straightener_k: parameters.get_or("straightenerK", None)?,
            driver,
        })
    }
}

/// A lattice with a normal load on top, friction below and a drive.
///
/// The top row carries `-fn / nx` each, every bottom node gets a
/// [`SpringFriction`] and every node is damped. The drive is either a
/// [`DriverBeam`](crate::DriverBeam) on the top row or potential pushers on
/// the left column.
#[derive(Debug)]
pub struct FrictionSystem {
    lattice: Lattice,
    friction: Arc<FrictionInfo>,
    settings: SystemParameters,
    eta: f64,
    driving: bool,
}

impl FrictionSystem {
    /// Build the lattice and the system it describes.
    ///
    /// The lattice is read from `latticefilename` when set and is otherwise a
    /// triangular `nx` by `ny` grid. A `seed` makes runs reproducible for a
    /// fixed thread count.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] for missing parameters, an unusable lattice file
    /// or an empty boundary.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, SetupError> {
        let info = LatticeInfo::from_parameters(parameters)?;
        let friction = FrictionInfo::from_parameters(parameters)?;
        let settings = SystemParameters::from_parameters(parameters)?;

        let mut lattice = match parameters.get_or::<Option<String>>("latticefilename", None)? {
            Some(path) => {
                let scanned = ScannedLattice::from_path(path)?;
                scanned.validate(settings.nx, settings.ny)?;
                Lattice::from_scan(info, &scanned, settings.density)
            }
            None => Lattice::triangular(info, settings.nx, settings.ny, settings.density),
        };
        if let Some(seed) = parameters.get_or::<Option<u64>>("seed", None)? {
            lattice = lattice.with_seed(seed);
        }
        Self::new(lattice, friction, settings)
    }

    /// Attach loads, friction, damping and the driver beam to `lattice`.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Config`] for a non-positive density and
    /// [`SetupError::EmptyBoundary`] when the lattice has no top or bottom
    /// nodes.
    pub fn new(
        mut lattice: Lattice,
        friction: FrictionInfo,
        settings: SystemParameters,
    ) -> Result<Self, SetupError> {
        require_positive("density", settings.density)?;
        if lattice.top_nodes().is_empty() {
            return Err(SetupError::EmptyBoundary("top"));
        }
        if lattice.bottom_nodes().is_empty() {
            return Err(SetupError::EmptyBoundary("bottom"));
        }
        let friction = Arc::new(friction);

        let load = -settings.normal_load / settings.nx as f64;
        for idx in lattice.top_nodes().to_vec() {
            lattice.add_modifier(idx, ForceModifier::constant_force(vector(0.0, load)))?;
        }
        for idx in lattice.bottom_nodes().to_vec() {
            let element = SpringFriction::new(Arc::clone(&friction));
            lattice.add_modifier(idx, ForceModifier::SpringFriction(element))?;
        }

        let mass = lattice.info().node_mass(settings.density);
        let eta = (0.1 * mass * lattice.info().kappa_normal).sqrt() * settings.relative_damping;
        for i in 0..lattice.len() {
            let idx = NodeIndex::new(i);
            lattice.add_modifier(idx, ForceModifier::RelativeVelocityDamper { eta })?;
            lattice.add_modifier(idx, ForceModifier::AbsoluteOmegaDamper { alpha: settings.alpha })?;
        }

        if let Some(driver) = settings.driver {
            lattice.attach_driver_beam(driver)?;
        }
        if let Some(k) = settings.straightener_k {
            let targets = straightened_nodes(&lattice);
            for idx in &targets {
                let straightener = StraightenerForce {
                    k,
                    reference: targets.clone(),
                };
                lattice.add_modifier(*idx, ForceModifier::Straightener(straightener))?;
            }
        }

        log::debug!(
            "Friction system: load per top node {load:e}, eta {eta:e}, alpha {:e}",
            settings.alpha
        );
        Ok(Self {
            lattice,
            friction,
            settings,
            eta,
            driving: false,
        })
    }

    /// The simulated lattice.
    #[must_use]
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// The simulated lattice, for extra modifiers or perturbations.
    pub fn lattice_mut(&mut self) -> &mut Lattice {
        &mut self.lattice
    }

    /// Interface constants shared by every friction element.
    #[must_use]
    pub fn friction_info(&self) -> &FrictionInfo {
        &self.friction
    }

    /// Loading settings.
    #[must_use]
    pub fn settings(&self) -> &SystemParameters {
        &self.settings
    }

    /// Relative velocity damping coefficient applied to every node.
    #[must_use]
    pub fn eta(&self) -> f64 {
        self.eta
    }

    /// Whether the drive has started.
    #[must_use]
    pub fn is_driving(&self) -> bool {
        self.driving
    }

    /// Allow or forbid friction elements to detach.
    pub fn lock_friction(&mut self, locked: bool) {
        self.lattice.set_friction_locked(locked);
    }

    /// Start the drive at time `t_init`.
    ///
    /// With a driver beam the beam switches to driving; otherwise pushers
    /// with stiffness `pK` are attached to the left column.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Config`] when side loading lacks `pK` and
    /// [`SetupError::EmptyBoundary`] when there are no left nodes.
    pub fn start_driving(&mut self, t_init: f64) -> Result<(), SetupError> {
        if self.driving {
            return Ok(());
        }
        if let Some(beam) = self.lattice.driver_beam_mut() {
            beam.start_driving();
        } else {
            let k = self
                .settings
                .pusher_k
                .ok_or_else(|| ConfigError::Missing("pK".to_owned()))?;
            self.add_pushers(k, self.settings.drive_velocity, t_init)?;
        }
        self.driving = true;
        Ok(())
    }

    /// Attach a [`PotentialPusher`](crate::PotentialPusher) to every left node.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::EmptyBoundary`] when there are no left nodes.
    pub fn add_pushers(&mut self, k: f64, drive_velocity: f64, t_init: f64) -> Result<(), SetupError> {
        let left = self.lattice.left_nodes().to_vec();
        if left.is_empty() {
            return Err(SetupError::EmptyBoundary("left"));
        }
        for idx in &left {
            self.lattice
                .add_modifier(*idx, ForceModifier::pusher(k, drive_velocity, t_init))?;
        }
        log::info!(
            "Attached {} pushers at t = {t_init:e} with vD = {drive_velocity:e}",
            left.len()
        );
        Ok(())
    }

    /// Advance by `dt`.
    pub fn step(&mut self, dt: f64) {
        self.lattice.step(dt);
    }

    /// Per-step output.
    #[must_use]
    pub fn data_packets(&self, timestep: u64) -> Vec<DataPacket> {
        self.lattice.data_packets(timestep)
    }

    /// One trajectory frame.
    #[must_use]
    pub fn xyz_string(&self) -> String {
        self.lattice.xyz_string()
    }

    /// Tangential force delivered by the drive.
    ///
    /// The x force on the beam nodes with a driver beam, otherwise the sum of
    /// the pusher forces.
    #[must_use]
    pub fn total_driver_force(&self) -> f64 {
        let nodes = self.lattice.nodes();
        match self.lattice.driver_beam() {
            Some(beam) => beam.total_shear_force(nodes),
            None => nodes
                .iter()
                .flat_map(|node| node.modifiers())
                .filter_map(|modifier| match modifier {
                    ForceModifier::PotentialPusher(pusher) => Some(pusher.push_force()),
                    _ => None,
                })
                .sum(),
        }
    }
}

/// The row kept straight: the nodes just below a driver beam, otherwise the
/// top row.
fn straightened_nodes(lattice: &Lattice) -> Vec<NodeIndex> {
    let Some(beam) = lattice.driver_beam() else {
        return lattice.top_nodes().to_vec();
    };
    let mut below: Vec<NodeIndex> = beam
        .nodes()
        .iter()
        .filter_map(|idx| lattice.node(*idx))
        .flat_map(|node| node.links().iter().map(|link| link.neighbor))
        .filter(|idx| !beam.contains(*idx))
        .collect();
    below.sort_unstable();
    below.dedup();
    below
}
