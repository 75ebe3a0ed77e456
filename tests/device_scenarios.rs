//! End-to-end scenarios driving `Device` over an in-memory transport.

use sweep_lidar::test_support::{response_header, response_info, response_param, sample, MockTransport};
use sweep_lidar::{Command, Device};

fn mock_device() -> (MockTransport, Device<MockTransport>) {
    let mock = MockTransport::new();
    let device = Device::from_transport(mock.clone());
    (mock, device)
}

#[test]
fn scenario_a_stop_on_open_writes_dx_twice_and_reads_matching_header() {
    let (mock, mut device) = mock_device();
    mock.queue_read(&response_header(Command::DataAcquisitionStop, 0, 0));
    mock.queue_read(&response_header(Command::DataAcquisitionStop, 0, 0));

    device.stop_scanning().expect("idempotent stop on a fresh device must succeed");

    let written = mock.written();
    assert_eq!(written, vec![b'D', b'X', 0x0A, b'D', b'X', 0x0A]);
}

#[test]
fn scenario_b_start_scanning_happy_path() {
    let (mock, mut device) = mock_device();
    mock.queue_read(&response_info(Command::MotorInformation, 5));
    mock.queue_read(&response_info(Command::MotorReadyQuery, 0));
    mock.queue_read(&response_header(Command::DataAcquisitionStart, 0, 0));

    device.start_scanning().expect("handshake with a ready, spinning motor must succeed");

    let written = mock.written();
    assert_eq!(
        written,
        vec![b'M', b'I', 0x0A, b'M', b'Z', 0x0A, b'D', b'S', 0x0A]
    );
}

#[test]
fn scenario_c_sample_decode_normalizes_full_circle_angle_to_zero() {
    let (mock, mut device) = mock_device();
    mock.queue_read(&response_info(Command::MotorInformation, 5));
    mock.queue_read(&response_info(Command::MotorReadyQuery, 0));
    mock.queue_read(&response_header(Command::DataAcquisitionStart, 0, 0));
    // One completed scan: sync(0x1680) + two ordinary samples, closed by
    // the next sync.
    mock.queue_read(&sample(true, false, 0x1680, 0x14, 0xC8));
    mock.queue_read(&sample(false, false, 0x0010, 1, 1));
    mock.queue_read(&sample(false, false, 0x0010, 2, 2));
    mock.queue_read(&sample(true, false, 0x0010, 99, 99));

    device.start_scanning().unwrap();
    let scan = device.get_scan().expect("worker must deliver the completed scan");

    assert_eq!(scan.len(), 3);
    let first = scan.samples()[0];
    assert_eq!(first.angle_millideg, 0);
    assert_eq!(first.distance_cm, 0x14);
    assert_eq!(first.signal_strength, 0xC8);
}

#[test]
fn scenario_d_set_motor_speed() {
    let (mock, mut device) = mock_device();
    mock.queue_read(&response_info(Command::MotorReadyQuery, 0));
    mock.queue_read(&response_param(Command::MotorSpeedAdjust, 7, 0, 0));

    device.set_motor_speed(7).expect("motor-ready device must accept a valid speed");

    let written = mock.written();
    assert_eq!(
        written,
        vec![b'M', b'Z', 0x0A, b'M', b'S', b'0', b'7', 0x0A]
    );
}

#[test]
fn scenario_e_set_sample_rate_750_then_read_it_back() {
    let (mock, mut device) = mock_device();
    mock.queue_read(&response_param(Command::SampleRateAdjust, 2, 0, 0));
    device.set_sample_rate(750).expect("750 Hz maps to a valid code");

    mock.queue_read(&response_info(Command::SampleRateInformation, 2));
    let hz = device.get_sample_rate().expect("sample rate query must succeed");
    assert_eq!(hz, 750);
}

#[test]
fn scenario_f_scan_queue_overflow_keeps_only_the_newest_scans() {
    let (mock, mut device) = mock_device();
    mock.queue_read(&response_info(Command::MotorInformation, 5));
    mock.queue_read(&response_info(Command::MotorReadyQuery, 0));
    mock.queue_read(&response_header(Command::DataAcquisitionStart, 0, 0));

    // 26 groups of [sync, normal, normal] marked by group index; this
    // yields 25 completed scans (group 26's sync only closes group 25).
    const GROUPS: i32 = 26;
    for marker in 1..=GROUPS {
        mock.queue_read(&sample(true, false, 0x0010, marker, 0));
        mock.queue_read(&sample(false, false, 0x0010, marker, 0));
        mock.queue_read(&sample(false, false, 0x0010, marker, 0));
    }

    device.start_scanning().unwrap();

    let mut markers = Vec::new();
    for _ in 0..20 {
        let scan = device.get_scan().expect("20 scans must survive the drop-oldest overflow");
        markers.push(scan.samples()[0].distance_cm);
    }
    assert_eq!(markers, (6..=25).collect::<Vec<_>>());
}

#[test]
fn idle_only_operation_while_scanning_is_rejected_without_touching_the_wire() {
    let (mock, mut device) = mock_device();
    mock.queue_read(&response_info(Command::MotorInformation, 5));
    mock.queue_read(&response_info(Command::MotorReadyQuery, 0));
    mock.queue_read(&response_header(Command::DataAcquisitionStart, 0, 0));
    device.start_scanning().unwrap();

    let written_before = mock.written().len();
    assert!(device.get_motor_speed().is_err());
    assert!(device.set_sample_rate(500).is_err());
    assert_eq!(mock.written().len(), written_before);
}
