use std::time::Duration;

use qcl_controller::{Param, PollOptions, Qcl, ScanMode, ScanOutcome, sim::QclSimulator};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // A simulated controller in manual stepscan mode that runs for four polls.
    let sim = QclSimulator::new()
        .with_value(Param::ScanMode, 2.0)
        .with_value(Param::ScanStep, 5.0)
        .with_scan_counts(vec![3, 2, 1, 0]);
    let mut qcl = Qcl::try_new(sim).unwrap();

    let opts = PollOptions {
        interval: Duration::from_millis(200),
        grace: Duration::from_millis(100),
        ..PollOptions::for_mode(qcl.get_scan_mode().unwrap())
    };
    assert_eq!(qcl.state().mode(), Some(ScanMode::ManualStepscan));

    qcl.scan_start().unwrap();
    let watch = qcl.watch_scan(&opts).unwrap();
    for progress in watch.progress().iter() {
        println!(
            "poll {}: {} cycles left, output at {:?} cm-1",
            progress.poll, progress.remaining, progress.output_wavenumber
        );
    }
    match watch.wait().unwrap() {
        ScanOutcome::Completed => println!("Scan completed"),
        ScanOutcome::Cancelled => println!("Scan cancelled"),
    }
    qcl.scan_stop().unwrap();
}
