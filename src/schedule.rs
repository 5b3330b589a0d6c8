use std::path::PathBuf;

use stickslip::{ConfigError, Parameters};

/// Time step, length and phase boundaries of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSchedule {
    /// Time step in seconds.
    pub step: f64,
    /// Number of steps.
    pub nt: u64,
    /// Step at which friction elements may start to detach.
    pub release_step: u64,
    /// Step at which the drive starts.
    pub driving_step: u64,
    /// Whether trajectory frames are written.
    pub write_xyz: bool,
    /// Steps between trajectory frames.
    pub freq_xyz: u64,
    /// Directory receiving all output; nothing is written when absent.
    pub output_path: Option<PathBuf>,
}

impl RunSchedule {
    /// Read the schedule from the parameter set.
    ///
    /// `releaseTime` and `drivingTime` are step indices and default to the
    /// first step; trajectory output is off unless `writeXYZ` is set.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, ConfigError> {
        let schedule = Self {
            step: parameters.get("step")?,
            nt: parameters.get("nt")?,
            release_step: parameters.get_or("releaseTime", 0)?,
            driving_step: parameters.get_or("drivingTime", 0)?,
            write_xyz: parameters.get_or("writeXYZ", false)?,
            freq_xyz: parameters.get_or("freqXYZ", 1)?,
            output_path: parameters.get_or("outputpath", None)?,
        };
        if !(schedule.step > 0.0) {
            return Err(ConfigError::Invalid {
                name: "step",
                value: schedule.step,
                reason: "must be positive",
            });
        }
        if schedule.freq_xyz == 0 {
            return Err(ConfigError::Invalid {
                name: "freqXYZ",
                value: 0.0,
                reason: "must be at least one step",
            });
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_phases_default_to_start() {
        let parameters = Parameters::new().with("step", 1.0e-7).with("nt", 1.0e3);
        let schedule = RunSchedule::from_parameters(&parameters).expect("complete");
        assert_eq!(schedule.nt, 1_000);
        assert_eq!(schedule.release_step, 0);
        assert_eq!(schedule.driving_step, 0);
        assert!(!schedule.write_xyz);
        assert!(schedule.output_path.is_none());
    }

    #[test]
    fn phase_boundaries_are_step_indices() {
        let parameters = Parameters::new()
            .with("step", 1.0e-7)
            .with("nt", 1.0e6)
            .with("releaseTime", 1.0e5)
            .with("drivingTime", 150_000);
        let schedule = RunSchedule::from_parameters(&parameters).expect("complete");
        assert_eq!(schedule.release_step, 100_000);
        assert_eq!(schedule.driving_step, 150_000);

        let fractional = parameters.with("releaseTime", 1.0e-6);
        let error = RunSchedule::from_parameters(&fractional).expect_err("not a step index");
        assert!(matches!(error, ConfigError::WrongType { .. }));
    }

    #[test]
    fn zero_frame_interval_is_rejected() {
        let parameters = Parameters::new()
            .with("step", 1.0e-7)
            .with("nt", 10)
            .with("freqXYZ", 0);
        let error = RunSchedule::from_parameters(&parameters).expect_err("freqXYZ = 0");
        assert!(matches!(error, ConfigError::Invalid { name: "freqXYZ", .. }));
    }
}
