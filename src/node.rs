//! Lattice nodes: beam-element force assembly and the per-step kinematic update.

use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;

use crate::geometry::{bearing, perpendicular, wrap_angle, Vector3};
use crate::lattice_info::LatticeInfo;
use crate::modifiers::ForceModifier;

/// Kinematic state of a node as seen by its neighbours.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeState {
    /// Position; the z component is unused.
    pub r: Vector3,
    /// Velocity.
    pub v: Vector3,
    /// Rotation angle.
    pub phi: f64,
    /// Angular velocity.
    pub omega: f64,
}

/// A beam connection to a neighbouring node, captured at build time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborLink {
    /// The node at the far end of the beam.
    pub neighbor: NodeIndex,
    /// Rest length.
    pub d0: f64,
    /// Bearing of the neighbour in the reference configuration.
    pub phi_offset: f64,
}

impl NeighborLink {
    /// Capture a link from the current relative position of two nodes.
    #[must_use]
    pub fn capture(neighbor: NodeIndex, from: &Vector3, to: &Vector3) -> Self {
        let delta = to - from;
        Self {
            neighbor,
            d0: delta.norm(),
            phi_offset: bearing(&delta),
        }
    }
}

/// Which lattice boundaries a node belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    /// Part of the loaded top row.
    pub top: bool,
    /// Part of the frictional bottom row.
    pub bottom: bool,
    /// Part of the left column.
    pub left: bool,
}

impl Classification {
    /// A node on no boundary.
    pub const INTERIOR: Self = Self {
        top: false,
        bottom: false,
        left: false,
    };

    /// Whether the node lies on none of the boundaries.
    #[must_use]
    pub fn is_interior(&self) -> bool {
        !(self.top || self.bottom || self.left)
    }

    /// Single-letter tag used in trajectory output.
    #[must_use]
    pub fn letter(&self) -> char {
        if self.bottom {
            'B'
        } else if self.top {
            'T'
        } else if self.left {
            'L'
        } else {
            'N'
        }
    }
}

/// How a node's position is advanced each step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    /// Integrated by the lattice sweep.
    Integrated,
    /// Positioned by the driver beam; forces are still assembled.
    Constrained,
}

/// Read-only data available to every node during force assembly.
#[derive(Clone, Copy, Debug)]
pub struct ForceContext<'a> {
    /// State of every node as published by the previous phase.
    pub states: &'a [NodeState],
    /// Beam constants.
    pub info: &'a LatticeInfo,
    /// Simulation time at which forces are evaluated.
    pub time: f64,
    /// When set, friction elements may not detach.
    pub friction_locked: bool,
}

/// A simulated point mass with rotational freedom.
#[derive(Clone, Debug)]
pub struct Node {
    /// Kinematic state.
    state: NodeState,
    /// Force accumulated by the last assembly.
    force: Vector3,
    /// Moment accumulated by the last assembly.
    moment: f64,
    /// Mass.
    mass: f64,
    /// Moment of inertia, already multiplied by the mass.
    moment_of_inertia: f64,
    /// Beam connections.
    links: Vec<NeighborLink>,
    /// Extra force sources, evaluated in attachment order.
    modifiers: Vec<ForceModifier>,
    /// Boundary membership.
    classification: Classification,
    /// Who advances the node's position.
    motion: Motion,
    /// When set the beam forces are skipped.
    force_fixed: bool,
}

impl Node {
    /// Create a node at rest.
    ///
    /// `inertia_factor` is the moment of inertia per unit mass.
    #[must_use]
    pub fn new(r: Vector3, mass: f64, inertia_factor: f64) -> Self {
        Self {
            state: NodeState {
                r,
                ..NodeState::default()
            },
            force: Vector3::zeros(),
            moment: 0.0,
            mass,
            moment_of_inertia: inertia_factor * mass,
            links: Vec::new(),
            modifiers: Vec::new(),
            classification: Classification::INTERIOR,
            motion: Motion::Integrated,
            force_fixed: false,
        }
    }

    /// Set the boundary membership.
    #[must_use]
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    /// Kinematic state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Position.
    #[must_use]
    pub fn r(&self) -> Vector3 {
        self.state.r
    }

    /// Velocity.
    #[must_use]
    pub fn v(&self) -> Vector3 {
        self.state.v
    }

    /// Rotation angle.
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.state.phi
    }

    /// Angular velocity.
    #[must_use]
    pub fn omega(&self) -> f64 {
        self.state.omega
    }

    /// Force from the last assembly.
    #[must_use]
    pub fn force(&self) -> Vector3 {
        self.force
    }

    /// Moment from the last assembly.
    #[must_use]
    pub fn moment(&self) -> f64 {
        self.moment
    }

    /// Mass.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Moment of inertia.
    #[must_use]
    pub fn moment_of_inertia(&self) -> f64 {
        self.moment_of_inertia
    }

    /// Beam connections.
    #[must_use]
    pub fn links(&self) -> &[NeighborLink] {
        &self.links
    }

    /// Attached force modifiers.
    #[must_use]
    pub fn modifiers(&self) -> &[ForceModifier] {
        &self.modifiers
    }

    /// Boundary membership.
    #[must_use]
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Who advances the node's position.
    #[must_use]
    pub fn motion(&self) -> Motion {
        self.motion
    }

    pub(crate) fn set_motion(&mut self, motion: Motion) {
        self.motion = motion;
    }

    pub(crate) fn push_link(&mut self, link: NeighborLink) {
        self.links.push(link);
    }

    /// Skip (or restore) the beam forces for this node.
    pub fn set_force_fixed(&mut self, fixed: bool) {
        self.force_fixed = fixed;
    }

    /// Set the rotation angle.
    pub fn set_phi(&mut self, phi: f64) {
        self.state.phi = phi;
    }

    /// Overwrite the position, bypassing the integrator.
    pub fn force_position(&mut self, r: Vector3) {
        self.state.r = r;
    }

    /// Overwrite the velocity, bypassing the integrator.
    pub fn force_velocity(&mut self, v: Vector3) {
        self.state.v = v;
    }

    /// Shift the position by `delta`.
    pub fn perturb_position(&mut self, delta: Vector3) {
        self.state.r += delta;
    }

    /// Attach a force modifier, initialising it against the current state.
    pub fn add_modifier(&mut self, mut modifier: ForceModifier) {
        modifier.initialize(&self.state);
        self.modifiers.push(modifier);
    }

    /// Detach every force modifier.
    pub fn clear_modifiers(&mut self) {
        self.modifiers.clear();
    }

    /// Recompute the force and moment acting on this node.
    ///
    /// Neighbours are read from `context.states`, never from live nodes, so
    /// every node of a lattice can be assembled concurrently.
    ///
    /// Relative beam rotations are node minus chord, `φ_ij = φ_i - chord`,
    /// which makes the shear force and moment restoring.
    ///
    /// Coincident linked nodes are a precondition violation: the bearing of a
    /// zero-length beam is undefined.
    pub fn update_forces_and_moments(&mut self, context: &ForceContext<'_>, rng: &mut StdRng) {
        self.force = Vector3::zeros();
        self.moment = 0.0;

        if !self.force_fixed {
            let info = context.info;
            for link in &self.links {
                let neighbor = &context.states[link.neighbor.index()];
                let r_diff = neighbor.r - self.state.r;
                let d_ij = r_diff.norm();
                let direction = r_diff / d_ij;

                // Rotation of the beam chord since the reference configuration.
                let chord = wrap_angle(bearing(&r_diff) - link.phi_offset);
                let phi_ij = self.state.phi - chord;
                let phi_ji = neighbor.phi - chord;

                let f_n = info.kappa_normal * (d_ij - link.d0);
                let f_s = -info.kappa_shear * 0.5 * (phi_ij + phi_ji);
                let m = -info.kappa_shear
                    * d_ij
                    * (info.shear_correction / 12.0 * (phi_ij - phi_ji)
                        + 0.5 * (2.0 / 3.0 * phi_ij + 1.0 / 3.0 * phi_ji));

                self.force += direction * f_n + perpendicular(&direction) * f_s;
                self.moment += m;
            }
        }

        let input = ModifierInput {
            state: &self.state,
            links: &self.links,
            context,
        };
        for modifier in &mut self.modifiers {
            self.force += modifier.force_contribution(&input, rng);
            self.moment += modifier.moment_contribution(&input);
        }
    }

    /// One half of the kinematic update.
    ///
    /// The lattice calls this twice per step around a force reassembly. Both
    /// halves drift the position by a full `dt` with the freshly kicked
    /// velocity.
    pub fn half_step(&mut self, dt: f64) {
        let state = &mut self.state;
        state.omega += (self.moment / self.moment_of_inertia) * 0.5 * dt;
        state.phi += state.omega * dt;
        state.v += (self.force / self.mass) * 0.5 * dt;
        state.r += state.v * dt;
    }
}

/// What a force modifier may look at while contributing.
#[derive(Clone, Copy, Debug)]
pub struct ModifierInput<'a> {
    /// State of the node the modifier is attached to.
    pub state: &'a NodeState,
    /// That node's beam connections.
    pub links: &'a [NeighborLink],
    /// Lattice-wide context.
    pub context: &'a ForceContext<'a>,
}
