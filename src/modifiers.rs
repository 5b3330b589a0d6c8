//! Extra force sources attached to individual nodes.

use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;

use crate::geometry::{vector, Vector3};
use crate::node::{ModifierInput, NodeState};
use crate::spring_friction::SpringFriction;

/// Drives a node's x position towards a target advancing at constant speed.
#[derive(Clone, Debug, PartialEq)]
pub struct PotentialPusher {
    /// Stiffness of the pushing potential.
    pub k: f64,
    /// Speed of the target.
    pub drive_velocity: f64,
    /// Time at which the target starts moving.
    pub t_init: f64,
    /// Target x position at `t_init`, taken from the node when attached.
    x_init: f64,
    /// Force applied in the most recent assembly.
    push_force: f64,
}

impl PotentialPusher {
    /// Create a pusher whose target starts at the node's attachment position.
    #[must_use]
    pub fn new(k: f64, drive_velocity: f64, t_init: f64) -> Self {
        Self {
            k,
            drive_velocity,
            t_init,
            x_init: 0.0,
            push_force: 0.0,
        }
    }

    /// Force applied in the most recent assembly.
    #[must_use]
    pub fn push_force(&self) -> f64 {
        self.push_force
    }

    fn evaluate(&mut self, x: f64, time: f64) -> Vector3 {
        let target = self.x_init + self.drive_velocity * (time - self.t_init);
        self.push_force = self.k * (target - x);
        vector(self.push_force, 0.0)
    }
}

/// Pulls a node's y position towards the mean y of a reference group.
#[derive(Clone, Debug, PartialEq)]
pub struct StraightenerForce {
    /// Stiffness of the pull.
    pub k: f64,
    /// Nodes whose mean height is the target.
    pub reference: Vec<NodeIndex>,
}

/// A force and/or moment source evaluated during force assembly.
///
/// Contributions are additive and are evaluated in attachment order; no
/// modifier sees another modifier's output from the same step.
#[derive(Clone, Debug)]
pub enum ForceModifier {
    /// A fixed force, e.g. the normal load on the top row.
    ConstantForce(Vector3),
    /// A fixed moment.
    ConstantMoment(f64),
    /// `η Σ (v_neighbor - v)` over the node's links.
    RelativeVelocityDamper {
        /// Damping coefficient.
        eta: f64,
    },
    /// `-α ω`.
    AbsoluteOmegaDamper {
        /// Damping coefficient.
        alpha: f64,
    },
    /// Linear repulsion from the half plane `y < 0`.
    PotentialSurface {
        /// Stiffness of the surface.
        k: f64,
    },
    /// See [`PotentialPusher`].
    PotentialPusher(PotentialPusher),
    /// See [`StraightenerForce`].
    Straightener(StraightenerForce),
    /// See [`SpringFriction`].
    SpringFriction(SpringFriction),
}

impl ForceModifier {
    /// A constant force.
    #[must_use]
    pub fn constant_force(force: Vector3) -> Self {
        Self::ConstantForce(force)
    }

    /// A potential pusher starting to move at `t_init`.
    #[must_use]
    pub fn pusher(k: f64, drive_velocity: f64, t_init: f64) -> Self {
        Self::PotentialPusher(PotentialPusher::new(k, drive_velocity, t_init))
    }

    /// Prepare per-instance state from the node's initial state.
    ///
    /// Called exactly once, when the modifier is attached.
    pub fn initialize(&mut self, state: &NodeState) {
        match self {
            Self::PotentialPusher(pusher) => pusher.x_init = state.r.x,
            Self::SpringFriction(friction) => friction.initialize(state.r.x),
            _ => {}
        }
    }

    /// Additional force on the node.
    pub fn force_contribution(&mut self, input: &ModifierInput<'_>, rng: &mut StdRng) -> Vector3 {
        let state = input.state;
        match self {
            Self::ConstantForce(force) => *force,
            Self::RelativeVelocityDamper { eta } => input
                .links
                .iter()
                .map(|link| input.context.states[link.neighbor.index()].v - state.v)
                .fold(Vector3::zeros(), |sum, dv| sum + dv * *eta),
            Self::PotentialSurface { k } => {
                if state.r.y < 0.0 {
                    vector(0.0, -*k * state.r.y)
                } else {
                    Vector3::zeros()
                }
            }
            Self::PotentialPusher(pusher) => pusher.evaluate(state.r.x, input.context.time),
            Self::Straightener(straightener) => {
                if straightener.reference.is_empty() {
                    return Vector3::zeros();
                }
                let states = input.context.states;
                let sum_y: f64 = straightener
                    .reference
                    .iter()
                    .map(|node| states[node.index()].r.y)
                    .sum();
                let mean = sum_y / straightener.reference.len() as f64;
                vector(0.0, (mean - state.r.y) * straightener.k)
            }
            Self::SpringFriction(friction) => friction.evaluate(
                &state.r,
                input.context.time,
                input.context.friction_locked,
                rng,
            ),
            Self::ConstantMoment(_) | Self::AbsoluteOmegaDamper { .. } => Vector3::zeros(),
        }
    }

    /// Additional moment on the node.
    #[must_use]
    pub fn moment_contribution(&self, input: &ModifierInput<'_>) -> f64 {
        match self {
            Self::ConstantMoment(moment) => *moment,
            Self::AbsoluteOmegaDamper { alpha } => -alpha * input.state.omega,
            _ => 0.0,
        }
    }
}
