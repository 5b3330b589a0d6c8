#![warn(clippy::all)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod config;
pub mod driver_beam;
pub mod errors;
pub mod friction_info;
pub mod geometry;
pub mod lattice;
pub mod lattice_info;
pub mod modifiers;
pub mod node;
pub mod output;
pub mod scanner;
pub mod spring_friction;
pub mod system;

pub use config::Parameters;
pub use driver_beam::{DriverBeam, DriverBeamParameters};
pub use errors::{ConfigError, OutputError, ScanError, SetupError};
pub use friction_info::FrictionInfo;
pub use geometry::{vector, Vector3};
pub use lattice::{Lattice, LatticeBuilder};
pub use lattice_info::LatticeInfo;
pub use modifiers::{ForceModifier, PotentialPusher, StraightenerForce};
pub use node::{Classification, Motion, NeighborLink, Node, NodeState};
pub use output::{DataKind, DataPacket, PacketWriter, XyzWriter};
pub use petgraph::graph::NodeIndex;
pub use scanner::{ScannedLattice, ScannedNode};
pub use spring_friction::{SpringFriction, SubSpring};
pub use system::{FrictionSystem, SystemParameters};
