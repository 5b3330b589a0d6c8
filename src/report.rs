use crate::run::RunSummary;
use std::fmt::Write;

/// Render a textual summary of a finished run.
#[must_use]
pub fn render_summary(summary: &RunSummary) -> String {
    let mut output = String::new();

    writeln!(
        &mut output,
        "Stick-slip run: {} steps, t = {:.3e} s",
        summary.steps, summary.final_time
    )
    .expect("writing to string cannot fail");

    // Peak drive force is the static friction of the block as a whole.
    writeln!(
        &mut output,
        "Peak driver force: {:+.3e} N",
        summary.max_driver_force
    )
    .expect("writing to string cannot fail");

    writeln!(
        &mut output,
        "Attached sub-springs at end: {:.1} %",
        100.0 * summary.attached_fraction
    )
    .expect("writing to string cannot fail");

    if summary.frames > 0 {
        writeln!(&mut output, "Trajectory frames written: {}", summary.frames)
            .expect("writing to string cannot fail");
    } else {
        output.push_str("Trajectory output: disabled\n");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_human_readable_report() {
        let summary = RunSummary {
            steps: 1_000,
            final_time: 1.0e-4,
            max_driver_force: 12.5,
            attached_fraction: 0.75,
            frames: 0,
        };
        let report = render_summary(&summary);
        assert!(report.contains("1000 steps"));
        assert!(report.contains("+1.250e1 N"));
        assert!(report.contains("75.0 %"));
        assert!(report.contains("disabled"));
    }
}
