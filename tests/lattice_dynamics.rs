#![warn(clippy::pedantic)]

use std::sync::Arc;

use approx::assert_relative_eq;
use stickslip::{
    vector, Classification, DriverBeamParameters, ForceModifier, FrictionInfo, Lattice,
    LatticeBuilder, LatticeInfo, NodeIndex, SpringFriction,
};

const DENSITY: f64 = 1000.0;

fn soft_material() -> LatticeInfo {
    LatticeInfo::new(1.0e7, 0.33, 0.01, 0.01).expect("valid material")
}

fn bottom() -> Classification {
    Classification {
        bottom: true,
        ..Classification::INTERIOR
    }
}

#[test]
fn free_node_follows_two_kick_closed_form() {
    let info = soft_material();
    let mut builder = LatticeBuilder::new(info, DENSITY);
    let idx = builder.add_node(vector(0.1, 0.2), Classification::INTERIOR);
    let mut lattice = builder.build();

    let force = vector(2.0e-3, -1.0e-3);
    let v0 = vector(0.5, 0.25);
    lattice
        .add_modifier(idx, ForceModifier::constant_force(force))
        .expect("node exists");
    lattice.node_mut(idx).expect("node exists").force_velocity(v0);

    let dt = 1.0e-3;
    lattice.step(dt);

    let node = lattice.node(idx).expect("node exists");
    let a = force / node.mass();
    let v = v0 + a * dt;
    let r = vector(0.1, 0.2) + v0 * (2.0 * dt) + a * (1.5 * dt * dt);
    assert_relative_eq!(node.v().x, v.x, max_relative = 1.0e-12);
    assert_relative_eq!(node.v().y, v.y, max_relative = 1.0e-12);
    assert_relative_eq!(node.r().x, r.x, max_relative = 1.0e-12);
    assert_relative_eq!(node.r().y, r.y, max_relative = 1.0e-12);
    assert_relative_eq!(lattice.time(), dt);
}

#[test]
fn cantilevered_chain_settles_on_locked_friction() {
    let info = soft_material();
    let d = info.spacing;
    let mut builder = LatticeBuilder::new(info, DENSITY);
    let a = builder.add_node(vector(-d, 0.0), bottom());
    let b = builder.add_node(vector(0.0, 0.0), bottom());
    let c = builder.add_node(vector(d, 0.0), Classification::INTERIOR);
    builder.connect_neighbors();
    assert_eq!(builder.link_count(), 2);
    let mut lattice = builder.build().with_seed(3);

    // One sub-spring per node carrying 1 N on average.
    let friction = Arc::new(
        FrictionInfo::new(2.0, 2, 1, 5.0e4, 1.0e3, 0.4, 0.16, 1.0e-3, 0.0)
            .expect("valid friction constants"),
    );
    let preload = 1.0;
    let tip_load = 1.0e-2;
    for idx in [a, b] {
        lattice
            .add_modifier(idx, ForceModifier::SpringFriction(SpringFriction::new(Arc::clone(&friction))))
            .expect("node exists");
        lattice
            .add_modifier(idx, ForceModifier::constant_force(vector(0.0, -preload)))
            .expect("node exists");
    }
    lattice
        .add_modifier(c, ForceModifier::constant_force(vector(0.0, -tip_load)))
        .expect("node exists");
    for idx in [a, b, c] {
        lattice
            .add_modifier(idx, ForceModifier::RelativeVelocityDamper { eta: 0.3 })
            .expect("node exists");
        lattice
            .add_modifier(idx, ForceModifier::AbsoluteOmegaDamper { alpha: 1.0e-5 })
            .expect("node exists");
    }
    lattice.set_friction_locked(true);

    for _ in 0..50_000 {
        lattice.step(1.0e-5);
    }

    for node in lattice.nodes() {
        assert!(node.force().norm() < 1.0e-4, "net force {}", node.force());
        assert!(node.moment().abs() < 1.0e-7, "net moment {}", node.moment());
        assert!(node.v().norm() < 1.0e-4);
    }

    let node = |idx: NodeIndex| lattice.node(idx).expect("node exists");
    // The tip sags and the middle node carries the lever reaction.
    assert!(node(c).r().y < node(b).r().y);
    assert!(node(b).r().y < node(a).r().y);
    assert!(node(a).r().y < 0.0);
    for modifier in node(b).modifiers() {
        if let ForceModifier::SpringFriction(element) = modifier {
            assert_eq!(element.connected_count(), 1);
            assert!(element.normal_force() > preload);
        }
    }
}

#[test]
fn unloaded_lattice_stays_at_rest() {
    let info = LatticeInfo::new(3.0e9, 0.33, 0.005, 0.006).expect("valid material");
    let mut lattice = Lattice::triangular(info, 6, 4, 1300.0);
    let initial: Vec<_> = lattice.nodes().iter().map(stickslip::Node::r).collect();

    for _ in 0..10 {
        lattice.step(1.0e-7);
    }

    for (node, r0) in lattice.nodes().iter().zip(initial) {
        assert!(node.force().norm() < 1.0e-9);
        assert!(node.moment().abs() < 1.0e-12);
        assert!((node.r() - r0).norm() < 1.0e-15);
    }
}

#[test]
fn driver_beam_takes_over_top_row_mass() {
    let info = LatticeInfo::new(3.0e9, 0.33, 0.005, 0.006).expect("valid material");
    let mut lattice = Lattice::triangular(info, 5, 3, 1300.0);
    let top = lattice.top_nodes().to_vec();
    let node_mass = info.node_mass(1300.0);

    lattice
        .attach_driver_beam(DriverBeamParameters {
            beam_mass: 0.02,
            drive_velocity: 1.0e-3,
            angle: 0.0,
            rotation_steps: 0,
            acceleration_period: 0,
        })
        .expect("top row present");

    let beam = lattice.driver_beam().expect("attached");
    let parameters = *beam.parameters();
    assert_relative_eq!(beam.mass(), 0.02 + 5.0 * node_mass, max_relative = 1.0e-12);
    assert_eq!(beam.nodes(), top.as_slice());

    let integrated = lattice.integrated_nodes();
    assert_eq!(integrated.len(), 10);
    assert!(top.iter().all(|idx| !integrated.contains(idx)));
    assert!(lattice.left_nodes().iter().all(|idx| !top.contains(idx)));

    let error = lattice
        .attach_driver_beam(parameters)
        .expect_err("second beam");
    assert!(matches!(error, stickslip::SetupError::DriverAlreadyAttached));
}

#[test]
fn driven_beam_moves_top_row_at_drive_velocity() {
    let info = LatticeInfo::new(3.0e9, 0.33, 0.005, 0.006).expect("valid material");
    let mut lattice = Lattice::triangular(info, 5, 3, 1300.0);
    lattice
        .attach_driver_beam(DriverBeamParameters {
            beam_mass: 0.02,
            drive_velocity: 1.0e-3,
            angle: 0.0,
            rotation_steps: 0,
            acceleration_period: 0,
        })
        .expect("top row present");
    lattice
        .driver_beam_mut()
        .expect("attached")
        .start_driving();

    let top = lattice.top_nodes().to_vec();
    let before: Vec<_> = top
        .iter()
        .map(|idx| lattice.node(*idx).expect("node exists").r())
        .collect();
    let dt = 1.0e-7;
    lattice.step(dt);

    for (idx, r0) in top.iter().zip(before) {
        let node = lattice.node(*idx).expect("node exists");
        assert_relative_eq!(node.v().x, 1.0e-3);
        // Both drifts move the node by vD·dt.
        assert_relative_eq!(node.r().x - r0.x, 2.0e-3 * dt, max_relative = 1.0e-6);
    }
}
