mod common;
use common::*;

use spectrovision_lib::DeviceLink;
use spectrovision_lib::command::IrradianceCalibration;
use spectrovision_lib::frame;

fn link() -> (SimulatedHead, DeviceLink<SimulatedHead>) {
    init_tracing();
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let link = DeviceLink::new(head.clone());
    (head, link)
}

#[tokio::test]
async fn alias_round_trip_and_delete() {
    let (head, link) = link();

    assert_eq!(link.get_alias().await.unwrap(), None);

    link.set_alias("Bench A").await.unwrap();
    assert_eq!(head.with(|s| s.alias.clone()).as_deref(), Some("Bench A"));
    assert_eq!(link.get_alias().await.unwrap().as_deref(), Some("Bench A"));

    link.set_alias("").await.unwrap();
    assert_eq!(link.get_alias().await.unwrap(), None);
}

#[tokio::test]
async fn alias_longer_than_immediate_area_is_rejected() {
    let (head, link) = link();
    let result = link.set_alias("a name that does not fit").await;
    assert!(matches!(result, Err(SpectroError::InvalidSetting(_))));
    assert!(head.requests().is_empty());
}

#[tokio::test]
async fn serial_number_is_checked_against_declared_length() {
    let (head, link) = link();
    assert_eq!(link.get_serial_number().await.unwrap(), "SV0042X1");

    // a serial longer than the immediate area comes back as bulk data
    head.with(|s| s.serial = "SV-0042-X1-FACTORY-LOT-7".to_string());
    assert_eq!(link.get_serial_number().await.unwrap(), "SV-0042-X1-FACTORY-LOT-7");
}

#[tokio::test]
async fn coefficients_are_read_in_order() {
    let (_head, link) = link();
    assert_eq!(link.get_wavelength_coefficients().await.unwrap(), VIS_COEFFICIENTS);
}

#[tokio::test]
async fn coefficients_can_be_rewritten() {
    let (head, link) = link();
    link.set_wavelength_coefficients(NIR_COEFFICIENTS).await.unwrap();
    assert_eq!(head.with(|s| s.coefficients), NIR_COEFFICIENTS);
    assert_eq!(head.count_requests(Opcode::SetWavelengthCoefficient), 4);
}

#[tokio::test]
async fn missing_calibration_is_none() {
    let (_head, link) = link();
    assert_eq!(link.get_irradiance_calibration().await.unwrap(), None);
}

#[tokio::test]
async fn calibration_upload_and_delete() {
    let (head, link) = link();
    let calibration = IrradianceCalibration {
        reference_integration_us: 20_000.0,
        ratios: vec![0.5; 481],
    };
    link.set_irradiance_calibration(Some(&calibration)).await.unwrap();
    assert_eq!(head.with(|s| s.calibration.as_ref().map(Vec::len)), Some(482));
    assert_eq!(link.get_irradiance_calibration().await.unwrap(), Some(calibration));

    link.set_irradiance_calibration(None).await.unwrap();
    assert_eq!(link.get_irradiance_calibration().await.unwrap(), None);
}

#[tokio::test]
async fn hot_pixels_round_trip() {
    let (_head, link) = link();
    assert!(link.get_hot_pixels().await.unwrap().is_empty());

    link.set_hot_pixels(&[12, 500, 1023]).await.unwrap();
    assert_eq!(link.get_hot_pixels().await.unwrap(), vec![12, 500, 1023]);

    let too_many: Vec<u16> = (0..59).collect();
    assert!(matches!(
        link.set_hot_pixels(&too_many).await,
        Err(SpectroError::InvalidSetting(_))
    ));
}

#[tokio::test]
async fn scans_and_baud_rate() {
    let (_head, link) = link();
    link.set_scans_to_average(16).await.unwrap();
    assert_eq!(link.get_scans_to_average().await.unwrap(), 16);
    assert!(link.set_scans_to_average(0).await.is_err());

    link.set_baud_rate(921_600).await.unwrap();
    assert_eq!(link.get_baud_rate().await.unwrap(), 921_600);
}

#[tokio::test]
async fn integration_time_goes_out_as_immediate_data() {
    let (head, link) = link();
    link.set_integration_time(10_000).await.unwrap();

    let raw = head.with(|s| s.last_frame.clone());
    assert_eq!(raw.len(), 64);
    assert_eq!(hex::encode(&raw[..4]), "c1c00010");
    assert_eq!(hex::encode(&raw[8..12]), "10001100");
    assert_eq!(raw[23], 4);
    assert_eq!(hex::encode(&raw[24..28]), "10270000");
    assert_eq!(hex::encode(&raw[40..44]), "14000000");
    assert_eq!(hex::encode(&raw[60..64]), "c5c4c3c2");
}

#[tokio::test]
async fn integration_below_firmware_minimum_is_rejected() {
    let (head, link) = link();
    assert!(matches!(
        link.set_integration_time(9).await,
        Err(SpectroError::InvalidSetting(_))
    ));
    link.set_integration_time(10).await.unwrap();
    assert_eq!(head.with(|s| s.integration_us), 10);
}

#[tokio::test]
async fn temperature_reading() {
    let (head, link) = link();
    head.with(|s| s.temperature = 31.5);
    assert_eq!(link.read_temperature().await.unwrap(), 31.5);
}

#[tokio::test]
async fn measurement_is_split_into_trigger_and_collect() {
    let (head, link) = link();
    link.start_measurement().await.unwrap();
    assert_eq!(head.count_requests(Opcode::GetSpectrum), 1);

    let counts = link
        .acquire_measurement(std::time::Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(counts.len(), PIXEL_COUNT);
    assert!(counts.iter().all(|&c| c == 5000));
}

#[tokio::test]
async fn short_scan_is_rejected_and_endpoint_flushed() {
    let (head, link) = link();
    head.set_scene(Scene::Samples(vec![3000; 200]));
    link.start_measurement().await.unwrap();
    // something else arrives behind the short scan
    head.inject_stale(&[0xAA; 64]);

    let result = link.acquire_measurement(std::time::Duration::from_millis(10)).await;
    match result {
        Err(SpectroError::DeviceCommunication(CommError::CorruptedScan { samples, minimum })) => {
            assert_eq!(samples, 200);
            assert_eq!(minimum, 400);
        }
        other => panic!("expected corrupted scan, got {:?}", other),
    }
    assert!(head.with(|s| s.pending.is_empty()));
}

#[tokio::test]
async fn dropped_read_is_retried_once() {
    let (head, link) = link();
    head.with(|s| s.dropped_reads = 1);
    assert_eq!(link.read_temperature().await.unwrap(), HEAD_TEMPERATURE);
}

#[tokio::test]
async fn two_dropped_reads_fail_and_flush() {
    let (head, link) = link();
    head.with(|s| s.dropped_reads = 2);
    let result = link.read_temperature().await;
    assert!(matches!(
        result,
        Err(SpectroError::DeviceCommunication(CommError::NoResponse))
    ));
    // the late reply was drained, so the next exchange lines up again
    assert!(head.with(|s| s.pending.is_empty()));
    assert_eq!(link.get_scans_to_average().await.unwrap(), 1);
}

#[tokio::test]
async fn zero_byte_write_is_retried_once() {
    let (head, link) = link();
    head.with(|s| s.refused_writes = 1);
    link.set_integration_time(25_000).await.unwrap();
    assert_eq!(head.with(|s| s.integration_us), 25_000);

    head.with(|s| s.refused_writes = 2);
    assert!(matches!(
        link.set_integration_time(30_000).await,
        Err(SpectroError::DeviceCommunication(CommError::WriteBlocked))
    ));
    assert_eq!(head.with(|s| s.integration_us), 25_000);
}

#[tokio::test]
async fn stale_bytes_are_flushed_after_a_malformed_reply() {
    let (head, link) = link();
    head.inject_stale(&[0x55; 64]);

    assert!(matches!(link.get_baud_rate().await, Err(SpectroError::Protocol(_))));
    assert!(head.with(|s| s.pending.is_empty()));
    assert_eq!(link.get_baud_rate().await.unwrap(), 115_200);
}

#[tokio::test]
async fn second_exchange_reports_busy_instead_of_waiting() {
    let (head, link) = link();
    let held = link.transport().try_begin().unwrap();

    assert!(matches!(link.read_temperature().await, Err(SpectroError::Busy)));
    assert!(link.start_measurement().await.unwrap_err().is_busy());
    assert!(head.requests().is_empty());

    drop(held);
    assert_eq!(link.read_temperature().await.unwrap(), HEAD_TEMPERATURE);
}

#[tokio::test]
async fn reply_to_another_opcode_is_discarded_and_request_repeated() {
    let (head, link) = link();
    let stale = frame::encode_response(Opcode::GetBaudRate.into(), 0, &115_200u32.to_le_bytes()).unwrap();
    head.inject_stale(&stale);

    assert_eq!(link.read_temperature().await.unwrap(), HEAD_TEMPERATURE);
    assert_eq!(head.count_requests(Opcode::ReadTemperature), 2);
    assert!(head.with(|s| s.pending.is_empty()));
    assert_eq!(link.get_scans_to_average().await.unwrap(), 1);
}
