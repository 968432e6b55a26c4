use qcl_controller::{Param, PollOptions, Qcl, ScanMode, SerialInterfaceQcl};
use tracing_subscriber::EnvFilter;

fn main() {
    // Set `RUST_LOG=qcl_controller=debug` to see every exchange with the controller.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let port = "/dev/ttyUSB0";

    // Open the controller and read all its parameters.
    let serial_inst = SerialInterfaceQcl::simple(port).expect("Failed to open serial port");
    let mut qcl = Qcl::try_new(serial_inst).expect("Failed to read controller state");
    println!("{}", qcl.state());

    // Tune the laser and check where it ended up.
    qcl.set_wavenumber(1080.0).unwrap();
    println!(
        "Output wavenumber: {} cm-1",
        qcl.get_output_wavenumber().unwrap()
    );

    // Configure a forward sweep from 1000 to 1100 cm-1 and run it twice.
    qcl.set_scan_range(1000.0, 1100.0).unwrap();
    qcl.set_scan_mode(ScanMode::ForwardSweep).unwrap();
    qcl.set_scan_cycles(2).unwrap();

    qcl.set_logging(true);
    qcl.scan_start().unwrap();
    qcl.wait_for_scan(&PollOptions::default()).unwrap();
    println!("Scan done, {} cycles left", qcl.get_scan_count().unwrap());

    // The pause is only available outside of manual stepscan mode.
    match qcl.get(Param::ScanPause).unwrap() {
        Some(pause) => println!("Scan pause: {pause} s"),
        None => println!("Scan pause not available in this mode"),
    }

    println!(
        "Working hours: {:.1} h",
        qcl.get_working_hours().unwrap().as_secs_f64() / 3600.0
    );

    let written = qcl.flush_log("qcl-communication.log").unwrap();
    println!("Wrote {written} lines to the communication log");

    qcl.close().unwrap();
}
