//! Per-step data packets and trajectory files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::OutputError;

/// What a [`DataPacket`] contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DataKind {
    /// `x, y` of every bottom node.
    InterfacePosition,
    /// `vx, vy` of every bottom node.
    InterfaceVelocity,
    /// Connected sub-spring count of every friction element.
    AttachedSprings,
    /// Summed normal force of every friction element.
    NormalForce,
    /// Summed tangential force of every friction element.
    ShearForce,
    /// `x, y` of every node not held by the driver beam.
    AllPosition,
    /// `vx, vy` of every node not held by the driver beam.
    AllVelocity,
    /// `fx, fy` of every node not held by the driver beam.
    AllForce,
    /// Force applied by every pusher.
    PusherForce,
    /// Moment on every driver-annexed node.
    BeamTorque,
    /// `fx` on every driver-annexed node.
    BeamShearForce,
}

impl DataKind {
    /// Every kind, in output order.
    pub const ALL: [Self; 11] = [
        Self::InterfacePosition,
        Self::InterfaceVelocity,
        Self::AttachedSprings,
        Self::NormalForce,
        Self::ShearForce,
        Self::AllPosition,
        Self::AllVelocity,
        Self::AllForce,
        Self::PusherForce,
        Self::BeamTorque,
        Self::BeamShearForce,
    ];

    /// File stem used when packets of this kind are written to disk.
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::InterfacePosition => "node_position_interface",
            Self::InterfaceVelocity => "node_velocity_interface",
            Self::AttachedSprings => "node_springs_attached_interface",
            Self::NormalForce => "normal_force",
            Self::ShearForce => "shear_force",
            Self::AllPosition => "node_position_all",
            Self::AllVelocity => "node_velocity_all",
            Self::AllForce => "node_total_force_all",
            Self::PusherForce => "pusher_force",
            Self::BeamTorque => "beam_torque",
            Self::BeamShearForce => "beam_shear_force",
        }
    }
}

/// A flat sequence of numbers sampled at one timestep.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataPacket {
    /// What the values mean.
    pub kind: DataKind,
    /// Index of the step the values were sampled after.
    pub timestep: u64,
    /// Simulation time of the sample.
    pub time: f64,
    /// The sampled values.
    pub values: Vec<f64>,
}

impl DataPacket {
    /// Create an empty packet.
    #[must_use]
    pub fn new(kind: DataKind, timestep: u64, time: f64) -> Self {
        Self {
            kind,
            timestep,
            time,
            values: Vec::new(),
        }
    }

    /// Append one value.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

/// Appends trajectory frames to a single text file.
#[derive(Debug)]
pub struct XyzWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: usize,
}

impl XyzWriter {
    /// Create (or truncate) the trajectory file.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let path = path.as_ref().to_path_buf();
        let writer = create(&path)?;
        log::info!("Writing trajectory to {}", path.display());
        Ok(Self {
            path,
            writer,
            frames: 0,
        })
    }

    /// Append one frame as produced by [`Lattice::xyz_string`](crate::Lattice::xyz_string).
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when the write fails.
    pub fn write_frame(&mut self, frame: &str) -> Result<(), OutputError> {
        self.writer
            .write_all(frame.as_bytes())
            .map_err(|source| OutputError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.frames += 1;
        Ok(())
    }

    /// Number of frames written so far.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Flush buffered frames to disk.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when the flush fails.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush().map_err(|source| OutputError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Writes packet values as raw little-endian doubles, one file per kind.
#[derive(Debug)]
pub struct PacketWriter {
    directory: PathBuf,
    writers: Vec<(DataKind, BufWriter<File>)>,
}

impl PacketWriter {
    /// Create one `<stem>.bin` file per kind in `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when the directory or a file cannot be
    /// created.
    pub fn create(directory: impl AsRef<Path>, kinds: &[DataKind]) -> Result<Self, OutputError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|source| OutputError::Io {
            path: directory.clone(),
            source,
        })?;
        let writers = kinds
            .iter()
            .map(|&kind| {
                let path = directory.join(format!("{}.bin", kind.file_stem()));
                create(&path).map(|writer| (kind, writer))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { directory, writers })
    }

    /// Append the values of every packet whose kind has a file.
    ///
    /// Packets of other kinds are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when a write fails.
    pub fn write(&mut self, packets: &[DataPacket]) -> Result<(), OutputError> {
        for packet in packets {
            let Some((kind, writer)) = self.writers.iter_mut().find(|(kind, _)| *kind == packet.kind)
            else {
                continue;
            };
            for value in &packet.values {
                writer
                    .write_all(&value.to_le_bytes())
                    .map_err(|source| OutputError::Io {
                        path: self.directory.join(format!("{}.bin", kind.file_stem())),
                        source,
                    })?;
            }
        }
        Ok(())
    }

    /// Flush every file.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when a flush fails.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        for (kind, writer) in &mut self.writers {
            writer.flush().map_err(|source| OutputError::Io {
                path: self.directory.join(format!("{}.bin", kind.file_stem())),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("stickslip-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir is writable");
        dir
    }

    #[test]
    fn file_stems_are_distinct() {
        let mut stems: Vec<_> = DataKind::ALL.iter().map(|kind| kind.file_stem()).collect();
        stems.sort_unstable();
        stems.dedup();
        assert_eq!(stems.len(), DataKind::ALL.len());
    }

    #[test]
    fn packet_values_are_written_as_little_endian_doubles() {
        let dir = scratch_dir("packets");
        let mut writer =
            PacketWriter::create(&dir, &[DataKind::NormalForce]).expect("files can be created");
        let mut packet = DataPacket::new(DataKind::NormalForce, 3, 0.5);
        packet.push(1.5);
        packet.push(-2.0);
        let ignored = DataPacket::new(DataKind::ShearForce, 3, 0.5);
        writer.write(&[packet, ignored]).expect("write succeeds");
        writer.flush().expect("flush succeeds");

        let bytes = fs::read(dir.join("normal_force.bin")).expect("file exists");
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[..8], 1.5f64.to_le_bytes());
        assert!(!dir.join("shear_force.bin").exists());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn xyz_frames_are_appended() {
        let dir = scratch_dir("xyz");
        let path = dir.join("trajectory.xyz");
        let mut writer = XyzWriter::create(&path).expect("file can be created");
        writer.write_frame("1\nTime: 0\nN 0 0 0 1 0 0\n").expect("write");
        writer.write_frame("1\nTime: 1\nN 1 0 0 1 0 0\n").expect("write");
        writer.flush().expect("flush");
        assert_eq!(writer.frames(), 2);
        let text = fs::read_to_string(&path).expect("file exists");
        assert_eq!(text.lines().count(), 6);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn unwritable_location_is_reported() {
        let error = XyzWriter::create("/nonexistent-directory/trajectory.xyz")
            .expect_err("directory does not exist");
        assert!(matches!(error, OutputError::Io { .. }));
    }
}
