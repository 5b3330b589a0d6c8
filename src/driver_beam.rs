//! Rigid beam that takes over the top row and imposes the driving motion.

use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::config::Parameters;
use crate::errors::{ConfigError, SetupError};
use crate::geometry::{cross_2d, rotate_clockwise, vector, Vector3};
use crate::node::{Motion, Node};
use crate::output::{DataKind, DataPacket};

/// Settings of a [`DriverBeam`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DriverBeamParameters {
    /// Mass of the beam itself, added to the annexed nodes.
    pub beam_mass: f64,
    /// Commanded x velocity once driving.
    pub drive_velocity: f64,
    /// Target tilt in radians, measured clockwise.
    pub angle: f64,
    /// Steps over which the tilt is reached before driving starts.
    pub rotation_steps: u64,
    /// Steps over which the velocity is ramped to `drive_velocity`.
    pub acceleration_period: u64,
}

impl DriverBeamParameters {
    /// Read `beamMass`, `vD`, `beamAngle`, `beamRotTime` and the optional
    /// `accelerationPeriod`.
    ///
    /// # Errors
    ///
    /// Propagates missing or mistyped parameters.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, ConfigError> {
        Ok(Self {
            beam_mass: parameters.get("beamMass")?,
            drive_velocity: parameters.get("vD")?,
            angle: parameters.get("beamAngle")?,
            rotation_steps: parameters.get("beamRotTime")?,
            acceleration_period: parameters.get_or("accelerationPeriod", 0)?,
        })
    }
}

/// A rigid body made of the lattice's top nodes.
///
/// Annexed nodes still assemble their own forces, but their positions are
/// overwritten from the beam's state every half step.
#[derive(Clone, Debug)]
pub struct DriverBeam {
    parameters: DriverBeamParameters,
    nodes: Vec<NodeIndex>,
    offsets: Vec<Vector3>,
    r: Vector3,
    v: Vector3,
    phi: f64,
    force: Vector3,
    moment: f64,
    mass: f64,
    moment_of_inertia: f64,
    driving: bool,
    initial_velocity: f64,
    velocity_steps: u64,
}

impl DriverBeam {
    /// Take over `members`, which must index into `nodes`.
    ///
    /// Every member is marked [`Motion::Constrained`] and its rotation reset.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::EmptyBoundary`] when `members` is empty and
    /// [`SetupError::UnknownNode`] for an index outside `nodes`.
    pub(crate) fn annex(
        parameters: DriverBeamParameters,
        nodes: &mut [Node],
        members: Vec<NodeIndex>,
        spacing: f64,
    ) -> Result<Self, SetupError> {
        if members.is_empty() {
            return Err(SetupError::EmptyBoundary("top"));
        }
        if let Some(&missing) = members.iter().find(|idx| idx.index() >= nodes.len()) {
            return Err(SetupError::UnknownNode(missing));
        }

        let count = members.len() as f64;
        let center = members
            .iter()
            .fold(Vector3::zeros(), |sum, idx| sum + nodes[idx.index()].r())
            / count;
        let mut mass = parameters.beam_mass;
        let mut offsets = Vec::with_capacity(members.len());
        for idx in &members {
            let node = &mut nodes[idx.index()];
            node.set_motion(Motion::Constrained);
            node.set_phi(0.0);
            offsets.push(node.r() - center);
            mass += node.mass();
        }
        let length = spacing * count;
        let beam = Self {
            parameters,
            nodes: members,
            offsets,
            r: center,
            v: Vector3::zeros(),
            phi: 0.0,
            force: Vector3::zeros(),
            moment: 0.0,
            mass,
            moment_of_inertia: mass * length * length / 12.0,
            driving: false,
            initial_velocity: 0.0,
            velocity_steps: 0,
        };
        log::debug!(
            "Driver beam annexed {} nodes, mass {:e}, moment of inertia {:e}",
            beam.nodes.len(),
            beam.mass,
            beam.moment_of_inertia
        );
        Ok(beam)
    }

    /// Annexed nodes.
    #[must_use]
    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    /// Whether `idx` is annexed.
    #[must_use]
    pub fn contains(&self, idx: NodeIndex) -> bool {
        self.nodes.contains(&idx)
    }

    /// Settings the beam was created with.
    #[must_use]
    pub fn parameters(&self) -> &DriverBeamParameters {
        &self.parameters
    }

    /// Centre position.
    #[must_use]
    pub fn r(&self) -> Vector3 {
        self.r
    }

    /// Centre velocity.
    #[must_use]
    pub fn v(&self) -> Vector3 {
        self.v
    }

    /// Tilt angle.
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.phi
    }

    /// Net force from the last aggregation.
    #[must_use]
    pub fn force(&self) -> Vector3 {
        self.force
    }

    /// Net moment about the centre from the last aggregation.
    #[must_use]
    pub fn moment(&self) -> f64 {
        self.moment
    }

    /// Annexed mass plus the beam mass.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Moment of inertia of a uniform rod spanning the annexed nodes.
    #[must_use]
    pub fn moment_of_inertia(&self) -> f64 {
        self.moment_of_inertia
    }

    /// Whether driving has started.
    #[must_use]
    pub fn is_driving(&self) -> bool {
        self.driving
    }

    /// Switch to driving. Later calls have no effect.
    pub fn start_driving(&mut self) {
        if self.driving {
            return;
        }
        self.driving = true;
        self.initial_velocity = self.v.x;
        self.velocity_steps = 0;
        log::info!(
            "Driver beam started driving at vD = {:e}",
            self.parameters.drive_velocity
        );
    }

    /// Sum the forces and moments assembled on the annexed nodes.
    pub(crate) fn aggregate(&mut self, nodes: &[Node]) {
        self.force = Vector3::zeros();
        self.moment = 0.0;
        for idx in &self.nodes {
            let node = &nodes[idx.index()];
            self.force += node.force();
            self.moment += cross_2d(&node.force(), &(self.r - node.r()));
        }
    }

    /// Advance the beam by half a step and place the annexed nodes.
    ///
    /// Ramp counters and the static tilt advance only on the first half.
    pub(crate) fn half_step(&mut self, nodes: &mut [Node], dt: f64, first_half: bool) {
        self.v += (self.force / self.mass) * 0.5 * dt;

        if self.driving {
            if first_half && self.velocity_steps < self.parameters.acceleration_period {
                self.velocity_steps += 1;
            }
            self.v.x = self.commanded_velocity();
            self.phi = self.parameters.angle;
        } else if first_half {
            self.phi = self.next_static_angle();
        }

        self.r += self.v * dt;

        for (idx, offset) in self.nodes.iter().zip(&self.offsets) {
            let node = &mut nodes[idx.index()];
            node.force_position(self.r + rotate_clockwise(offset, self.phi));
            node.set_phi(self.phi);
            if self.driving {
                node.force_velocity(self.v);
            }
        }
    }

    fn commanded_velocity(&self) -> f64 {
        let period = self.parameters.acceleration_period;
        if period == 0 || self.velocity_steps >= period {
            self.parameters.drive_velocity
        } else {
            let fraction = self.velocity_steps as f64 / period as f64;
            self.initial_velocity + (self.parameters.drive_velocity - self.initial_velocity) * fraction
        }
    }

    fn next_static_angle(&self) -> f64 {
        let target = self.parameters.angle;
        if self.parameters.rotation_steps == 0 {
            return target;
        }
        let next = self.phi + target / self.parameters.rotation_steps as f64;
        if target >= 0.0 {
            next.min(target)
        } else {
            next.max(target)
        }
    }

    /// Moment and x force on every annexed node.
    #[must_use]
    pub fn data_packets(&self, nodes: &[Node], timestep: u64, time: f64) -> Vec<DataPacket> {
        let mut torque = DataPacket::new(DataKind::BeamTorque, timestep, time);
        let mut shear = DataPacket::new(DataKind::BeamShearForce, timestep, time);
        for idx in &self.nodes {
            let node = &nodes[idx.index()];
            torque.push(node.moment());
            shear.push(node.force().x);
        }
        vec![torque, shear]
    }

    /// x force summed over the annexed nodes.
    #[must_use]
    pub fn total_shear_force(&self, nodes: &[Node]) -> f64 {
        self.nodes.iter().map(|idx| nodes[idx.index()].force().x).sum()
    }
}
