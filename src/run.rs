use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use stickslip::{
    DataKind, FrictionInfo, FrictionSystem, LatticeInfo, OutputError, PacketWriter,
    SystemParameters, XyzWriter,
};

use crate::schedule::RunSchedule;

/// Key numbers of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Steps taken.
    pub steps: u64,
    /// Simulation time at the end of the run.
    pub final_time: f64,
    /// Largest tangential force delivered by the drive.
    pub max_driver_force: f64,
    /// Connected fraction of all sub-springs at the end of the run.
    pub attached_fraction: f64,
    /// Trajectory frames written.
    pub frames: usize,
}

/// Constants a run was set up with, written next to its output.
#[derive(Serialize)]
struct Setup<'a> {
    lattice: &'a LatticeInfo,
    friction: &'a FrictionInfo,
    system: &'a SystemParameters,
    nodes: usize,
}

fn dump_setup(system: &FrictionSystem, directory: &Path) -> Result<(), OutputError> {
    let path = directory.join("setup.json");
    let io_error = |source| OutputError::Io {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(directory).map_err(io_error)?;
    let file = File::create(&path).map_err(io_error)?;
    let setup = Setup {
        lattice: system.lattice().info(),
        friction: system.friction_info(),
        system: system.settings(),
        nodes: system.lattice().len(),
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &setup).map_err(|source| io_error(source.into()))?;
    writer.flush().map_err(io_error)
}

/// Run the schedule: settle with friction locked, release it, then drive.
///
/// Every run starts locked. Before step `releaseTime` (0-based) friction is
/// released and before step `drivingTime` the drive starts. Packets are
/// written every step and trajectory frames every `freqXYZ` steps when an
/// output directory is configured.
pub fn run_simulation(
    system: &mut FrictionSystem,
    schedule: &RunSchedule,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let mut packets = None;
    let mut xyz = None;
    if let Some(directory) = &schedule.output_path {
        dump_setup(system, directory)?;
        packets = Some(PacketWriter::create(directory, &DataKind::ALL)?);
        if schedule.write_xyz {
            xyz = Some(XyzWriter::create(directory.join("model.xyz"))?);
        }
    }

    system.lock_friction(true);
    let progress_interval = (schedule.nt / 10).max(1);
    let mut max_driver_force = f64::NEG_INFINITY;

    for timestep in 0..schedule.nt {
        if timestep == schedule.release_step {
            system.lock_friction(false);
        }
        if !system.is_driving() && timestep >= schedule.driving_step {
            system.start_driving(system.lattice().time())?;
        }

        system.step(schedule.step);
        let completed = timestep + 1;

        if system.is_driving() {
            max_driver_force = max_driver_force.max(system.total_driver_force());
        }
        if let Some(writer) = &mut packets {
            writer.write(&system.data_packets(completed))?;
        }
        if let Some(writer) = &mut xyz {
            if completed % schedule.freq_xyz == 0 {
                writer.write_frame(&system.xyz_string())?;
            }
        }
        if completed % progress_interval == 0 {
            log::info!(
                "{:3.0} % done, t = {:e}",
                100.0 * completed as f64 / schedule.nt as f64,
                system.lattice().time()
            );
        }
    }

    if let Some(writer) = &mut packets {
        writer.flush()?;
    }
    let frames = match &mut xyz {
        Some(writer) => {
            writer.flush()?;
            writer.frames()
        }
        None => 0,
    };

    Ok(RunSummary {
        steps: schedule.nt,
        final_time: system.lattice().time(),
        max_driver_force: if max_driver_force.is_finite() {
            max_driver_force
        } else {
            0.0
        },
        attached_fraction: attached_fraction(system),
        frames,
    })
}

fn attached_fraction(system: &FrictionSystem) -> f64 {
    let (connected, total) = system
        .lattice()
        .nodes()
        .iter()
        .flat_map(|node| node.modifiers())
        .filter_map(|modifier| match modifier {
            stickslip::ForceModifier::SpringFriction(friction) => {
                Some((friction.connected_count(), friction.springs().len()))
            }
            _ => None,
        })
        .fold((0, 0), |(c, t), (connected, total)| (c + connected, t + total));
    if total == 0 {
        0.0
    } else {
        connected as f64 / total as f64
    }
}
