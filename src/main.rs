mod report;
mod run;
mod schedule;

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use report::render_summary;
use run::run_simulation;
use schedule::RunSchedule;
use stickslip::{FrictionSystem, Parameters};

/// Simulate a loaded block sliding over a stick-slip frictional interface.
#[derive(Parser)]
#[clap(author, version, about, name = "stickslip")]
struct Opt {
    /// Path to the JSON parameter file.
    ///
    /// The file holds one object of named parameters describing the lattice,
    /// the interface, the drive and the run schedule.
    #[clap(name = "PARAMETERS", parse(from_os_str))]
    parameters: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opt = Opt::parse();
    let parameters = Parameters::from_path(&opt.parameters)?;
    let schedule = RunSchedule::from_parameters(&parameters)?;

    // Lattice, loads, friction elements, dampers and the drive.
    let mut system = FrictionSystem::from_parameters(&parameters)?;

    let summary = run_simulation(&mut system, &schedule)?;
    println!("{}", render_summary(&summary));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line_takes_one_parameter_file() {
        Opt::command().debug_assert();
        let opt = Opt::try_parse_from(["stickslip", "runs/block.json"]).expect("valid arguments");
        assert_eq!(opt.parameters, PathBuf::from("runs/block.json"));
        assert!(Opt::try_parse_from(["stickslip"]).is_err());
    }
}
