use std::time::Duration;

use instrumentrs::{InstrumentError, LoopbackInterface};
use measurements::Frequency;
use qcl_controller::*;
use rstest::*;

/// Create a new loopback instrument from the given input string slices.
fn crt_inst(host2inst: Vec<&str>, inst2host: Vec<&str>) -> Qcl<LoopbackInterface> {
    let h2i: Vec<String> = host2inst.iter().map(|s| s.to_string()).collect();
    let i2h: Vec<String> = inst2host.iter().map(|s| s.to_string()).collect();
    let interface = LoopbackInterface::new(h2i, i2h);
    Qcl::new(interface)
}

/// Create an empty loopback interface for the QCL controller.
#[fixture]
fn emp_inst() -> Qcl<LoopbackInterface> {
    crt_inst(vec![], vec![])
}

/// Fixed-width scan cycles reply.
fn cycles_reply(cycles: u32) -> String {
    format!("{cycles:>18}\r\n")
}

#[rstest]
fn test_get_wavenumber() {
    let mut inst = crt_inst(vec![":laser:set?"], vec!["1000.00 cm-1\n"]);

    assert_eq!(
        inst.get(Param::Wavenumber).unwrap(),
        Some(Value::Float(1000.0))
    );
    assert_eq!(inst.state().get(Param::Wavenumber), Some(Value::Float(1000.0)));
}

#[rstest]
fn test_set_wavenumber_confirms() {
    let mut inst = crt_inst(
        vec![":laser:set?", ":laser:set 1080.00", ":laser:set?"],
        vec!["1000.00 cm-1\n", "1080.00 cm-1\n"],
    );

    assert_eq!(inst.get_wavenumber().unwrap(), 1000.0);
    assert_eq!(inst.set_wavenumber(1080.0).unwrap(), 1080.0);
    assert_eq!(inst.state().get(Param::Wavenumber), Some(Value::Float(1080.0)));
}

#[rstest]
#[case(Param::Wavenumber, 980.0)]
#[case(Param::Wavenumber, 1245.0)]
#[case(Param::PulseFrequency, 0.5)]
#[case(Param::ScanRate, 6.1)]
#[case(Param::ScanPause, -0.1)]
#[case(Param::ScanStep, 300.0)]
#[case(Param::ScanStep, 0.0)]
#[case(Param::PulseWidth, 0.6)]
#[case(Param::PulseWidth, 0.03)]
#[case(Param::ScanCycles, 10001.0)]
#[case(Param::ScanCycles, 0.0)]
#[case(Param::ScanStart, 1245.0)]
#[case(Param::ScanStop, 980.0)]
fn test_set_float_out_of_range(
    mut emp_inst: Qcl<LoopbackInterface>,
    #[case] param: Param,
    #[case] value: f64,
) {
    match emp_inst.set(param, value) {
        Err(InstrumentError::FloatValueOutOfRange { value: v, .. }) => assert_eq!(v, value),
        other => panic!("Expected FloatValueOutOfRange, got {other:?}"),
    }
}

#[rstest]
#[case(5.0, 5)]
#[case(0.0, 0)]
#[case(0.9, 0)]
#[case(-1.0, -1)]
fn test_set_int_out_of_range(
    mut emp_inst: Qcl<LoopbackInterface>,
    #[case] mode: f64,
    #[case] sent: i64,
) {
    match emp_inst.set(Param::ScanMode, mode) {
        Err(InstrumentError::IntValueOutOfRange { value, min, max }) => {
            assert_eq!((value, min, max), (sent, 1, 4));
        }
        other => panic!("Expected IntValueOutOfRange, got {other:?}"),
    }
}

#[rstest]
#[case(Param::OutputWavenumber)]
#[case(Param::WorkingHours)]
#[case(Param::ScanCount)]
fn test_set_read_only(mut emp_inst: Qcl<LoopbackInterface>, #[case] param: Param) {
    assert!(matches!(
        emp_inst.set(param, 1.0),
        Err(InstrumentError::InvalidArgument(_))
    ));
}

#[rstest]
fn test_gated_while_mode_unknown(mut emp_inst: Qcl<LoopbackInterface>) {
    assert_eq!(emp_inst.get(Param::ScanPause).unwrap(), None);
    assert_eq!(emp_inst.get(Param::ScanStep).unwrap(), None);
    assert_eq!(emp_inst.set_scan_step(1.0).unwrap(), None);
    assert!(!emp_inst.state().is_known(Param::ScanPause));
}

#[rstest]
fn test_manual_stepscan_gates_pause() {
    let mut inst = crt_inst(
        vec![":scan:mode 2", ":scan:mode?", ":scan:step?"],
        vec!["2\r\n", " 0.50 cm-1\n"],
    );

    assert_eq!(
        inst.set_scan_mode(ScanMode::ManualStepscan).unwrap(),
        ScanMode::ManualStepscan
    );
    assert_eq!(inst.get_scan_pause().unwrap(), None);
    assert_eq!(inst.set_scan_pause(Duration::from_secs(1)).unwrap(), None);
    assert_eq!(inst.get_scan_step().unwrap(), Some(0.5));
}

#[rstest]
fn test_sweep_gates_step() {
    let mut inst = crt_inst(
        vec![":scan:mode?", ":scan:pause 1.50", ":scan:pause?"],
        vec!["3\r\n", "1.50 sec\n"],
    );

    assert_eq!(inst.get_scan_mode().unwrap(), ScanMode::ForwardSweep);
    assert_eq!(inst.get_scan_step().unwrap(), None);
    assert_eq!(
        inst.set_scan_pause(Duration::from_millis(1500)).unwrap(),
        Some(Duration::from_millis(1500))
    );
}

#[rstest]
fn test_get_all_in_sweep_mode() {
    let cycles = cycles_reply(5);
    let mut inst = crt_inst(
        vec![
            ":laser:set?",
            ":laser:pos?",
            ":pulse:freq?",
            ":pulse:width?",
            ":scan:start?",
            ":scan:stop?",
            ":scan:rate?",
            ":scan:cycles?",
            ":scan:mode?",
            ":scan:pause?",
            ":info:hhrs?",
            ":scan:count?",
        ],
        vec![
            "1000.00 cm-1\n",
            "1000.00 cm-1\n",
            "100.0 kHz\n",
            "0.50 usec\n",
            "1000.00 cm-1\n",
            "1100.00 cm-1\n",
            "1\r\n",
            cycles.as_str(),
            "3\r\n",
            "0.50 sec\n",
            "1234.5 hrs\n",
            "0000\r\n",
        ],
    );

    let state = inst.get_all().unwrap();
    assert_eq!(state.mode(), Some(ScanMode::ForwardSweep));
    assert_eq!(state.get(Param::ScanCycles), Some(Value::Float(5.0)));
    assert_eq!(state.get(Param::ScanStop), Some(Value::Float(1100.0)));
    assert!(!state.is_known(Param::ScanStep));
    assert_eq!(state.iter().count(), 12);
}

#[rstest]
#[case("7\r\n")]
#[case("0\r\n")]
fn test_unknown_scan_mode_reply(#[case] reply: &str) {
    let mut inst = crt_inst(vec![":scan:mode?"], vec![reply]);

    match inst.get_scan_mode() {
        Err(InstrumentError::ResponseParseError(msg)) => assert!(msg.contains("scan mode")),
        other => panic!("Expected ResponseParseError, got {other:?}"),
    }
    assert_eq!(inst.state().mode(), None);
}

#[rstest]
fn test_parse_error_keeps_state() {
    let mut inst = crt_inst(vec![":laser:set?"], vec!["garbage cm-1\n"]);

    assert!(matches!(
        inst.get(Param::Wavenumber),
        Err(InstrumentError::ResponseParseError(_))
    ));
    assert_eq!(*inst.state(), DeviceState::default());
}

#[rstest]
fn test_short_reply() {
    let mut inst = crt_inst(vec![":laser:set?"], vec!["1000.0"]);

    match inst.get_wavenumber() {
        Err(InstrumentError::IncompleteResponse { expected, received }) => {
            assert_eq!(expected, 13);
            assert_eq!(received, "1000.0");
        }
        other => panic!("Expected IncompleteResponse, got {other:?}"),
    }
    assert!(!inst.state().is_known(Param::Wavenumber));
}

#[rstest]
fn test_scan_commands() {
    let mut inst = crt_inst(vec![":scan:run 1", ":scan:step:next", ":scan:run 0"], vec![]);

    inst.scan_start().unwrap();
    inst.step_next().unwrap();
    inst.scan_stop().unwrap();
}

#[rstest]
fn test_pulse_frequency() {
    let mut inst = crt_inst(
        vec![":pulse:freq 50.0", ":pulse:freq?"],
        vec![" 50.0 kHz\n"],
    );

    let freq = inst
        .set_pulse_frequency(Frequency::from_kilohertz(50.0))
        .unwrap();
    assert_eq!(freq.as_kilohertz(), 50.0);
}

#[rstest]
fn test_pulse_width() {
    let mut inst = crt_inst(
        vec![":pulse:width 0.20", ":pulse:width?"],
        vec!["0.20 usec\n"],
    );

    let width = inst.set_pulse_width(Duration::from_nanos(200)).unwrap();
    assert!((width.as_secs_f64() - 0.2e-6).abs() < 1e-12);
}

#[rstest]
fn test_scan_range() {
    let mut inst = crt_inst(
        vec![
            ":scan:start 1000.00",
            ":scan:start?",
            ":scan:stop 1244.99",
            ":scan:stop?",
        ],
        vec!["1000.00 cm-1\n", "1244.99 cm-1\n"],
    );

    assert!(inst.set_scan_range(1000.0, 1300.0).is_err());
    assert_eq!(inst.set_scan_range(1000.0, 1244.99).unwrap(), (1000.0, 1244.99));
}

#[rstest]
fn test_scan_cycles_and_count() {
    let cycles = cycles_reply(10);
    let mut inst = crt_inst(
        vec![":scan:cycles 10", ":scan:cycles?", ":scan:count?"],
        vec![cycles.as_str(), "0007\r\n"],
    );

    assert_eq!(inst.set_scan_cycles(10).unwrap(), 10);
    assert_eq!(inst.get_scan_count().unwrap(), 7);
}

#[rstest]
fn test_working_hours() {
    let mut inst = crt_inst(vec![":info:hhrs?"], vec!["1234.5 hrs\n"]);

    assert_eq!(inst.get_working_hours().unwrap().as_secs(), 4_444_200);
}

#[rstest]
fn test_logging_set_produces_two_entries() {
    let mut inst = crt_inst(
        vec![":laser:set 1080.00", ":laser:set?"],
        vec!["1080.00 cm-1\n"],
    );
    inst.set_logging(true);
    assert!(inst.is_logging());

    inst.set(Param::Wavenumber, 1080.0).unwrap();

    let entries = inst.log_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].direction, Direction::Sent);
    assert_eq!(entries[0].text, ":laser:set 1080.00\n");
    assert_eq!(entries[1].direction, Direction::Received);
    assert_eq!(entries[1].text, "1080.00 cm-1\n");
}

#[rstest]
fn test_logging_get_and_disabled() {
    let mut inst = crt_inst(
        vec![":scan:count?", ":scan:count?"],
        vec!["0000\r\n", "0000\r\n"],
    );

    assert!(!inst.is_logging());
    inst.get_scan_count().unwrap();
    assert!(inst.log_entries().is_empty());

    inst.set_logging(true);
    inst.get_scan_count().unwrap();
    let texts: Vec<String> = inst.log_entries().into_iter().map(|e| e.text).collect();
    assert_eq!(texts, vec![":scan:count?\n", "0000\r\n"]);
}

#[rstest]
fn test_clone_shares_state() {
    let mut inst = crt_inst(vec![":scan:mode?"], vec!["1\r\n"]);
    let other = inst.clone();

    inst.get(Param::ScanMode).unwrap();
    assert_eq!(other.state().mode(), Some(ScanMode::AutoStepscan));
}

#[rstest]
fn test_close(emp_inst: Qcl<LoopbackInterface>) {
    emp_inst.close().unwrap();
}
