//! The node arena and its parallel time step.

use std::fmt::Write;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::driver_beam::{DriverBeam, DriverBeamParameters};
use crate::errors::SetupError;
use crate::geometry::{vector, Vector3};
use crate::lattice_info::LatticeInfo;
use crate::modifiers::ForceModifier;
use crate::node::{Classification, ForceContext, Motion, NeighborLink, Node, NodeState};
use crate::output::{DataKind, DataPacket};
use crate::scanner::ScannedLattice;

/// Incrementally assembles a lattice's nodes and beam connections.
///
/// Connectivity is collected in an undirected graph and converted to per-node
/// [`NeighborLink`]s by [`LatticeBuilder::build`], using the node positions at
/// that moment as the reference configuration.
#[derive(Debug)]
pub struct LatticeBuilder {
    info: LatticeInfo,
    mass: f64,
    graph: UnGraph<(Vector3, Classification), ()>,
}

impl LatticeBuilder {
    /// Start an empty lattice whose nodes have the given material density.
    #[must_use]
    pub fn new(info: LatticeInfo, density: f64) -> Self {
        Self {
            mass: info.node_mass(density),
            info,
            graph: UnGraph::default(),
        }
    }

    /// Number of nodes added so far.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of beam connections added so far.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Add a node at `r`.
    pub fn add_node(&mut self, r: Vector3, classification: Classification) -> NodeIndex {
        self.graph.add_node((r, classification))
    }

    /// Connect two nodes with a beam.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::UnknownNode`] when either handle is not part of
    /// the builder.
    pub fn connect(&mut self, a: NodeIndex, b: NodeIndex) -> Result<EdgeIndex, SetupError> {
        for idx in [a, b] {
            if self.graph.node_weight(idx).is_none() {
                return Err(SetupError::UnknownNode(idx));
            }
        }
        Ok(self.graph.update_edge(a, b, ()))
    }

    /// Connect every pair of nodes whose distance lies strictly between
    /// `0.01 d` and `1.01 d`.
    pub fn connect_neighbors(&mut self) {
        let d = self.info.spacing;
        let (min, max) = (0.01 * d, 1.01 * d);
        let positions: Vec<(NodeIndex, Vector3)> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.graph[idx].0))
            .collect();
        for (i, (a, ra)) in positions.iter().enumerate() {
            for (b, rb) in &positions[i + 1..] {
                let distance = (rb - ra).norm();
                if distance > min && distance < max {
                    self.graph.update_edge(*a, *b, ());
                }
            }
        }
    }

    /// Freeze the connectivity into a [`Lattice`].
    #[must_use]
    pub fn build(self) -> Lattice {
        let inertia = self.info.node_inertia_factor();
        let mut nodes: Vec<Node> = self
            .graph
            .node_indices()
            .map(|idx| {
                let (r, classification) = self.graph[idx];
                Node::new(r, self.mass, inertia).with_classification(classification)
            })
            .collect();
        for edge in self.graph.edge_indices() {
            if let Some((a, b)) = self.graph.edge_endpoints(edge) {
                let (ra, rb) = (nodes[a.index()].r(), nodes[b.index()].r());
                nodes[a.index()].push_link(NeighborLink::capture(b, &ra, &rb));
                nodes[b.index()].push_link(NeighborLink::capture(a, &rb, &ra));
            }
        }
        log::debug!(
            "Built lattice with {} nodes and {} links",
            nodes.len(),
            self.graph.edge_count()
        );
        Lattice::from_nodes(self.info, nodes)
    }
}

/// A set of beam-connected nodes advanced together in time.
#[derive(Debug)]
pub struct Lattice {
    info: LatticeInfo,
    nodes: Vec<Node>,
    top: Vec<NodeIndex>,
    bottom: Vec<NodeIndex>,
    left: Vec<NodeIndex>,
    interior: Vec<NodeIndex>,
    driver: Option<DriverBeam>,
    time: f64,
    friction_locked: bool,
    primed: bool,
    rngs: Vec<StdRng>,
}

impl Lattice {
    fn from_nodes(info: LatticeInfo, nodes: Vec<Node>) -> Self {
        let subset = |keep: fn(&Classification) -> bool| -> Vec<NodeIndex> {
            nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| keep(&node.classification()))
                .map(|(i, _)| NodeIndex::new(i))
                .collect()
        };
        let top = subset(|c| c.top);
        let bottom = subset(|c| c.bottom);
        let left = subset(|c| c.left);
        let interior = subset(Classification::is_interior);
        Self {
            info,
            top,
            bottom,
            left,
            interior,
            nodes,
            driver: None,
            time: 0.0,
            friction_locked: false,
            primed: false,
            rngs: worker_rngs(None),
        }
    }

    /// A triangular lattice of `nx` columns and `ny` rows.
    ///
    /// Odd rows are shifted by half a spacing and rows are `d·sin(60°)` apart.
    /// Row 0 is the bottom boundary, row `ny - 1` the top and column 0 the
    /// left.
    ///
    /// # Examples
    /// ```
    /// use stickslip::{Lattice, LatticeInfo};
    ///
    /// let info = LatticeInfo::new(3.0e9, 0.33, 0.005, 0.006).expect("valid material");
    /// let lattice = Lattice::triangular(info, 5, 3, 1300.0);
    /// assert_eq!(lattice.len(), 15);
    /// assert_eq!(lattice.bottom_nodes().len(), 5);
    /// ```
    #[must_use]
    pub fn triangular(info: LatticeInfo, nx: usize, ny: usize, density: f64) -> Self {
        let d = info.spacing;
        let pitch = d * 60f64.to_radians().sin();
        Self::grid(info, nx, ny, density, |i, j| {
            vector(i as f64 * d + (j % 2) as f64 * d / 2.0, j as f64 * pitch)
        })
    }

    /// A square lattice of `nx` columns and `ny` rows.
    #[must_use]
    pub fn square(info: LatticeInfo, nx: usize, ny: usize, density: f64) -> Self {
        let d = info.spacing;
        Self::grid(info, nx, ny, density, |i, j| vector(i as f64 * d, j as f64 * d))
    }

    fn grid(
        info: LatticeInfo,
        nx: usize,
        ny: usize,
        density: f64,
        position: impl Fn(usize, usize) -> Vector3,
    ) -> Self {
        let mut builder = LatticeBuilder::new(info, density);
        for j in 0..ny {
            for i in 0..nx {
                let classification = Classification {
                    top: j + 1 == ny,
                    bottom: j == 0,
                    left: i == 0,
                };
                builder.add_node(position(i, j), classification);
            }
        }
        builder.connect_neighbors();
        builder.build()
    }

    /// A lattice read from a description file.
    #[must_use]
    pub fn from_scan(info: LatticeInfo, scanned: &ScannedLattice, density: f64) -> Self {
        let mut builder = LatticeBuilder::new(info, density);
        for node in &scanned.nodes {
            builder.add_node(node.r, node.classification);
        }
        builder.connect_neighbors();
        builder.build()
    }

    /// Seed every worker generator from `seed`.
    ///
    /// Runs are reproducible only for a fixed rayon thread count.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rngs = worker_rngs(Some(seed));
        self
    }

    /// Beam constants.
    #[must_use]
    pub fn info(&self) -> &LatticeInfo {
        &self.info
    }

    /// Number of nodes, including those annexed by a driver beam.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the lattice has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node, indexed by [`NodeIndex::index`].
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx.index())
    }

    /// Look up a node for modification.
    pub fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut Node> {
        self.nodes.get_mut(idx.index())
    }

    /// Nodes of the top row.
    #[must_use]
    pub fn top_nodes(&self) -> &[NodeIndex] {
        &self.top
    }

    /// Nodes of the frictional bottom row.
    #[must_use]
    pub fn bottom_nodes(&self) -> &[NodeIndex] {
        &self.bottom
    }

    /// Nodes of the left column, excluding any annexed by the driver beam.
    #[must_use]
    pub fn left_nodes(&self) -> &[NodeIndex] {
        &self.left
    }

    /// Nodes on no boundary.
    #[must_use]
    pub fn interior_nodes(&self) -> &[NodeIndex] {
        &self.interior
    }

    /// Nodes advanced by the lattice's own integrator.
    #[must_use]
    pub fn integrated_nodes(&self) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.motion() == Motion::Integrated)
            .map(|(i, _)| NodeIndex::new(i))
            .collect()
    }

    /// Attach a force modifier to a node.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::UnknownNode`] when `idx` is not part of the lattice.
    pub fn add_modifier(&mut self, idx: NodeIndex, modifier: ForceModifier) -> Result<(), SetupError> {
        let node = self
            .nodes
            .get_mut(idx.index())
            .ok_or(SetupError::UnknownNode(idx))?;
        node.add_modifier(modifier);
        Ok(())
    }

    /// Elapsed simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Whether friction elements are prevented from detaching.
    #[must_use]
    pub fn friction_locked(&self) -> bool {
        self.friction_locked
    }

    /// Allow or forbid friction elements to detach.
    pub fn set_friction_locked(&mut self, locked: bool) {
        if locked != self.friction_locked {
            log::info!(
                "Friction {} at t = {:e}",
                if locked { "locked" } else { "released" },
                self.time
            );
        }
        self.friction_locked = locked;
    }

    /// Hand the top row over to a rigid driver beam.
    ///
    /// The annexed nodes stop being integrated by the lattice and are removed
    /// from the left subset.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::DriverAlreadyAttached`] on a second call and
    /// [`SetupError::EmptyBoundary`] when the lattice has no top nodes.
    pub fn attach_driver_beam(&mut self, parameters: DriverBeamParameters) -> Result<(), SetupError> {
        if self.driver.is_some() {
            return Err(SetupError::DriverAlreadyAttached);
        }
        let beam = DriverBeam::annex(
            parameters,
            &mut self.nodes,
            self.top.clone(),
            self.info.spacing,
        )?;
        self.left.retain(|idx| !beam.contains(*idx));
        self.driver = Some(beam);
        Ok(())
    }

    /// The attached driver beam.
    #[must_use]
    pub fn driver_beam(&self) -> Option<&DriverBeam> {
        self.driver.as_ref()
    }

    /// The attached driver beam, for starting the drive.
    pub fn driver_beam_mut(&mut self) -> Option<&mut DriverBeam> {
        self.driver.as_mut()
    }

    /// Advance the lattice by `dt`.
    ///
    /// Each step is a half kick and drift of every integrated node, a full
    /// force reassembly at `t + dt/2`, and a second half kick and drift. The
    /// driver beam takes its half steps right after the lattice's.
    pub fn step(&mut self, dt: f64) {
        if !self.primed {
            self.assemble_forces();
            self.primed = true;
        }
        self.half_kick(dt, true);
        self.time += 0.5 * dt;
        self.assemble_forces();
        self.half_kick(dt, false);
        self.time += 0.5 * dt;
    }

    fn half_kick(&mut self, dt: f64, first_half: bool) {
        self.nodes
            .par_iter_mut()
            .filter(|node| node.motion() == Motion::Integrated)
            .for_each(|node| node.half_step(dt));
        if let Some(driver) = &mut self.driver {
            driver.half_step(&mut self.nodes, dt, first_half);
        }
    }

    /// Recompute every node's force and moment from the published states.
    fn assemble_forces(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        let states: Vec<NodeState> = self.nodes.par_iter().map(Node::state).collect();
        let context = ForceContext {
            states: &states,
            info: &self.info,
            time: self.time,
            friction_locked: self.friction_locked,
        };
        let chunk = (self.nodes.len() + self.rngs.len() - 1) / self.rngs.len();
        self.nodes
            .par_chunks_mut(chunk)
            .zip(self.rngs.par_iter_mut())
            .for_each(|(nodes, rng)| {
                for node in nodes {
                    node.update_forces_and_moments(&context, rng);
                }
            });
        if let Some(driver) = &mut self.driver {
            driver.aggregate(&self.nodes);
        }
    }

    /// Sample the per-step output of every node subset.
    ///
    /// The `All*` packets cover the integrated nodes only; nodes held by the
    /// driver beam are reported through its own packets.
    #[must_use]
    pub fn data_packets(&self, timestep: u64) -> Vec<DataPacket> {
        let time = self.time;
        let packet = |kind| DataPacket::new(kind, timestep, time);
        let mut interface_position = packet(DataKind::InterfacePosition);
        let mut interface_velocity = packet(DataKind::InterfaceVelocity);
        let mut attached = packet(DataKind::AttachedSprings);
        let mut normal = packet(DataKind::NormalForce);
        let mut shear = packet(DataKind::ShearForce);
        let mut all_position = packet(DataKind::AllPosition);
        let mut all_velocity = packet(DataKind::AllVelocity);
        let mut all_force = packet(DataKind::AllForce);
        let mut pusher = packet(DataKind::PusherForce);

        for idx in &self.bottom {
            let node = &self.nodes[idx.index()];
            interface_position.values.extend([node.r().x, node.r().y]);
            interface_velocity.values.extend([node.v().x, node.v().y]);
        }
        for node in &self.nodes {
            if node.motion() == Motion::Integrated {
                all_position.values.extend([node.r().x, node.r().y]);
                all_velocity.values.extend([node.v().x, node.v().y]);
                all_force.values.extend([node.force().x, node.force().y]);
            }
            for modifier in node.modifiers() {
                match modifier {
                    ForceModifier::SpringFriction(friction) => {
                        attached.push(friction.connected_count() as f64);
                        normal.push(friction.normal_force());
                        shear.push(friction.shear_force());
                    }
                    ForceModifier::PotentialPusher(p) => pusher.push(p.push_force()),
                    _ => {}
                }
            }
        }

        let mut packets = vec![
            interface_position,
            interface_velocity,
            attached,
            normal,
            shear,
            all_position,
            all_velocity,
            all_force,
            pusher,
        ];
        if let Some(driver) = &self.driver {
            packets.extend(driver.data_packets(&self.nodes, timestep, time));
        }
        packets
    }

    /// One trajectory frame: a count line, a time line and one line per node.
    ///
    /// Each node line reads `<kind> x y z cos(phi) sin(phi) 0`, where the kind
    /// letter is `D` for nodes held by the driver beam.
    #[must_use]
    pub fn xyz_string(&self) -> String {
        let mut output = String::new();
        writeln!(&mut output, "{}", self.nodes.len()).expect("writing to string cannot fail");
        writeln!(&mut output, "Time: {}", self.time).expect("writing to string cannot fail");
        for node in &self.nodes {
            let letter = match node.motion() {
                Motion::Constrained => 'D',
                Motion::Integrated => node.classification().letter(),
            };
            let r = node.r();
            let (sin, cos) = node.phi().sin_cos();
            writeln!(&mut output, "{letter} {} {} {} {cos} {sin} 0", r.x, r.y, r.z)
                .expect("writing to string cannot fail");
        }
        output
    }
}

/// One generator per rayon worker.
fn worker_rngs(seed: Option<u64>) -> Vec<StdRng> {
    let workers = rayon::current_num_threads().max(1);
    (0..workers)
        .map(|worker| match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker as u64)),
            None => StdRng::from_entropy(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn info() -> LatticeInfo {
        LatticeInfo::new(3.0e9, 0.33, 0.005, 0.006).expect("valid material")
    }

    fn driver() -> DriverBeamParameters {
        DriverBeamParameters {
            beam_mass: 0.1,
            drive_velocity: 1.0e-3,
            angle: 0.0,
            rotation_steps: 1,
            acceleration_period: 0,
        }
    }

    #[test]
    fn triangular_lattice_classifies_boundaries() {
        let lattice = Lattice::triangular(info(), 4, 3, 1300.0);
        assert_eq!(lattice.len(), 12);
        assert_eq!(lattice.top_nodes().len(), 4);
        assert_eq!(lattice.bottom_nodes().len(), 4);
        assert_eq!(lattice.left_nodes().len(), 3);
        assert_eq!(lattice.interior_nodes().len(), 3);
    }

    #[test]
    fn interior_triangular_node_has_six_neighbors() {
        let lattice = Lattice::triangular(info(), 4, 3, 1300.0);
        // Column 1 of row 1 is fully surrounded.
        let node = lattice.node(NodeIndex::new(5)).expect("node exists");
        assert_eq!(node.links().len(), 6);
        for link in node.links() {
            assert_relative_eq!(link.d0, 0.005, max_relative = 1.0e-9);
        }
    }

    #[test]
    fn square_lattice_links_only_axis_neighbors() {
        let lattice = Lattice::square(info(), 3, 3, 1300.0);
        let centre = lattice.node(NodeIndex::new(4)).expect("node exists");
        assert_eq!(centre.links().len(), 4);
    }

    #[test]
    fn node_mass_matches_disc_of_diameter_d() {
        let info = info();
        let lattice = Lattice::square(info, 2, 2, 1000.0);
        let expected = 1000.0 * 0.005 * 0.005 * 0.006 / 4.0 * std::f64::consts::PI;
        assert_relative_eq!(lattice.nodes()[0].mass(), expected, max_relative = 1.0e-12);
        assert_relative_eq!(
            lattice.nodes()[0].moment_of_inertia(),
            expected * 0.005 * 0.005 / 8.0,
            max_relative = 1.0e-12
        );
    }

    #[test]
    fn builder_rejects_unknown_nodes() {
        let mut builder = LatticeBuilder::new(info(), 1000.0);
        let a = builder.add_node(vector(0.0, 0.0), Classification::INTERIOR);
        let error = builder
            .connect(a, NodeIndex::new(7))
            .expect_err("node 7 does not exist");
        assert!(matches!(error, SetupError::UnknownNode(idx) if idx.index() == 7));
    }

    #[test]
    fn repeated_connections_are_merged() {
        let mut builder = LatticeBuilder::new(info(), 1000.0);
        let a = builder.add_node(vector(0.0, 0.0), Classification::INTERIOR);
        let b = builder.add_node(vector(0.005, 0.0), Classification::INTERIOR);
        builder.connect(a, b).expect("both exist");
        builder.connect(b, a).expect("both exist");
        builder.connect_neighbors();
        assert_eq!(builder.link_count(), 1);
        let lattice = builder.build();
        assert_eq!(lattice.nodes()[0].links().len(), 1);
        assert_eq!(lattice.nodes()[1].links()[0].neighbor, a);
    }

    #[test]
    fn unknown_node_cannot_take_modifier() {
        let mut lattice = Lattice::square(info(), 2, 2, 1000.0);
        let error = lattice
            .add_modifier(NodeIndex::new(10), ForceModifier::ConstantMoment(1.0))
            .expect_err("out of range");
        assert!(matches!(error, SetupError::UnknownNode(_)));
    }

    #[test]
    fn undisturbed_lattice_stays_at_rest() {
        let mut lattice = Lattice::triangular(info(), 4, 3, 1300.0).with_seed(3);
        let before: Vec<Vector3> = lattice.nodes().iter().map(Node::r).collect();
        for _ in 0..10 {
            lattice.step(1.0e-7);
        }
        assert_relative_eq!(lattice.time(), 1.0e-6, max_relative = 1.0e-12);
        for (node, r0) in lattice.nodes().iter().zip(before) {
            assert_relative_eq!((node.r() - r0).norm(), 0.0, epsilon = 1.0e-15);
        }
    }

    #[test]
    fn driver_beam_takes_over_top_row() {
        let mut lattice = Lattice::triangular(info(), 4, 3, 1300.0);
        let top = lattice.top_nodes().to_vec();
        let top_mass: f64 = top.iter().map(|idx| lattice.nodes()[idx.index()].mass()).sum();
        lattice.attach_driver_beam(driver()).expect("top row exists");

        let beam = lattice.driver_beam().expect("attached");
        assert_relative_eq!(beam.mass(), top_mass + 0.1, max_relative = 1.0e-12);
        let integrated = lattice.integrated_nodes();
        assert_eq!(integrated.len(), 8);
        assert!(top.iter().all(|idx| !integrated.contains(idx)));
        assert!(lattice.left_nodes().iter().all(|idx| !top.contains(idx)));

        let error = lattice
            .attach_driver_beam(driver())
            .expect_err("second beam");
        assert!(matches!(error, SetupError::DriverAlreadyAttached));
    }

    #[test]
    fn packets_cover_friction_and_driver_output() {
        let mut lattice = Lattice::square(info(), 3, 2, 1300.0);
        let friction = std::sync::Arc::new(
            crate::FrictionInfo::new(3.0, 3, 2, 1.0e6, 1.0e6, 0.5, 0.3, 1.0e-3, 0.0)
                .expect("valid friction"),
        );
        for idx in lattice.bottom_nodes().to_vec() {
            lattice
                .add_modifier(
                    idx,
                    ForceModifier::SpringFriction(crate::SpringFriction::new(friction.clone())),
                )
                .expect("node exists");
        }
        lattice.attach_driver_beam(driver()).expect("top row exists");
        // The bottom row rests exactly on y = 0 and would lift off unlocked.
        lattice.set_friction_locked(true);
        lattice.step(1.0e-8);

        let packets = lattice.data_packets(1);
        let find = |kind: DataKind| {
            packets
                .iter()
                .find(|packet| packet.kind == kind)
                .expect("packet present")
        };
        assert_eq!(find(DataKind::AttachedSprings).values, vec![2.0; 3]);
        // Three of the six nodes belong to the beam.
        assert_eq!(find(DataKind::AllPosition).values.len(), 6);
        assert_eq!(find(DataKind::AllForce).values.len(), 6);
        assert_eq!(find(DataKind::BeamTorque).values.len(), 3);
        assert_eq!(find(DataKind::InterfacePosition).timestep, 1);
    }

    #[test]
    fn xyz_frame_tags_driver_nodes() {
        let mut lattice = Lattice::square(info(), 2, 2, 1300.0);
        lattice.attach_driver_beam(driver()).expect("top row exists");
        let frame = lattice.xyz_string();
        let lines: Vec<&str> = frame.lines().collect();
        assert_eq!(lines[0], "4");
        assert_eq!(lines[1], "Time: 0");
        assert!(lines[2].starts_with("B "));
        assert!(lines[4].starts_with("D "));
        assert!(lines[2].ends_with(" 1 0 0"));
    }
}
