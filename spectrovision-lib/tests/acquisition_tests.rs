mod common;
use common::*;

use spectrovision_lib::acquisition::AcquisitionState;
use spectrovision_lib::calibration::LampTable;
use spectrovision_lib::constants::{SATURATED_INTEGRATION_US, TARGET_HIGH, TARGET_LOW};
use spectrovision_lib::{SensorFamily, Totals};

fn assert_all_close(values: &[f64], expected: f64, tolerance: f64) {
    for (i, v) in values.iter().enumerate() {
        assert!(
            (v - expected).abs() <= tolerance,
            "value {} at index {} differs from {}",
            v,
            i,
            expected
        );
    }
}

#[tokio::test(start_paused = true)]
async fn handshake_reads_identity_geometry_and_sets_integration() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    head.with(|s| {
        s.alias = Some("Greenhouse 3".to_string());
        s.hot_pixels = vec![400, 401];
    });
    let instrument = connect(&head).await;

    assert_eq!(instrument.name(), "Greenhouse 3");
    assert_eq!(instrument.family(), SensorFamily::Vis);
    assert_eq!(instrument.grid().len(), 481);
    assert_eq!(instrument.hot_pixels().len(), 2);
    assert!(instrument.irradiance_calibration().is_none());
    assert_eq!(head.with(|s| s.integration_us), 10_000);
    assert_eq!(instrument.state(), AcquisitionState::Idle);
    assert!(
        instrument
            .wavelength_table()
            .anchors()
            .iter()
            .all(|a| a.pixel != 400 && a.pixel != 401)
    );
}

#[tokio::test(start_paused = true)]
async fn handshake_discards_leftovers_from_a_previous_session() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    head.inject_stale(&[0x11; 256]);
    let instrument = connect(&head).await;
    assert_eq!(instrument.coefficients().0, VIS_COEFFICIENTS);
}

#[tokio::test(start_paused = true)]
async fn flat_vis_scan_in_counts() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();

    let spectrum = instrument.acquire(false).await.unwrap();

    assert_eq!(spectrum.values.len(), 481);
    assert_eq!(spectrum.integration_us, 10_000);
    assert_eq!(spectrum.totals, Totals::None);
    assert_all_close(&spectrum.values, 5000.0 - floor_offset(), 1e-6);

    let flat = spectrum.to_flat();
    assert_eq!(flat.len(), 482);
    assert_eq!(flat[481], 10_000.0);

    assert_eq!(instrument.state(), AcquisitionState::Ready);
    assert_eq!(instrument.last_spectrum(), Some(&spectrum));
    assert_eq!(instrument.last_temperature(), Some(HEAD_TEMPERATURE));
}

#[tokio::test(start_paused = true)]
async fn corrupted_scan_is_reported_and_not_stored() {
    let head = SimulatedHead::vis(Scene::Samples(vec![3000; 200]));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();

    let result = instrument.acquire(false).await;
    assert!(matches!(
        result,
        Err(SpectroError::DeviceCommunication(CommError::CorruptedScan { samples: 200, .. }))
    ));
    assert!(instrument.last_spectrum().is_none());
    assert_eq!(instrument.state(), AcquisitionState::Idle);

    head.set_scene(Scene::Flat(5000));
    assert!(instrument.acquire(false).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn auto_integration_brings_the_peak_into_the_target_band() {
    let head = SimulatedHead::vis(Scene::Proportional {
        floor: 1500,
        counts_per_us: 0.5,
    });
    let mut instrument = connect(&head).await;
    assert!(instrument.auto_integration());

    let spectrum = instrument.acquire(false).await.unwrap();

    let integration = instrument.integration_us();
    assert_eq!(head.with(|s| s.integration_us), integration);
    assert_eq!(spectrum.integration_us, integration);
    let peak = 1500.0 + 0.5 * f64::from(integration);
    assert!(
        peak >= f64::from(TARGET_LOW) && peak <= f64::from(TARGET_HIGH),
        "peak {} at {} µs is outside the target band",
        peak,
        integration
    );
    // the returned values come from the scan taken at the final integration time
    assert_all_close(&spectrum.values, peak.floor() - floor_offset(), 1e-6);
    // one trigger per adjustment plus the first scan
    assert!(head.count_requests(Opcode::GetSpectrum) <= 4);
}

#[tokio::test(start_paused = true)]
async fn saturated_scene_drops_to_the_saturation_integration() {
    let head = SimulatedHead::vis(Scene::Proportional {
        floor: 1500,
        counts_per_us: 10.0,
    });
    let mut instrument = connect(&head).await;

    instrument.acquire(false).await.unwrap();

    assert_eq!(instrument.integration_us(), SATURATED_INTEGRATION_US);
    assert_eq!(head.with(|s| s.integration_us), SATURATED_INTEGRATION_US);
}

#[tokio::test(start_paused = true)]
async fn manual_integration_is_never_adjusted() {
    let head = SimulatedHead::vis(Scene::Proportional {
        floor: 1500,
        counts_per_us: 0.5,
    });
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();

    instrument.acquire(false).await.unwrap();

    assert_eq!(instrument.integration_us(), 10_000);
    assert_eq!(head.count_requests(Opcode::GetSpectrum), 1);
}

#[tokio::test(start_paused = true)]
async fn dark_reference_cancels_an_unchanged_scene() {
    let head = SimulatedHead::vis(Scene::Flat(2000));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();

    instrument.take_dark_reference().await.unwrap();
    assert!(instrument.references().has_dark());

    let spectrum = instrument.acquire(false).await.unwrap();
    assert_all_close(&spectrum.values, 0.0, 1e-9);

    instrument.clear_dark_reference();
    let spectrum = instrument.acquire(false).await.unwrap();
    assert_all_close(&spectrum.values, 2000.0 - floor_offset(), 1e-6);
}

#[tokio::test(start_paused = true)]
async fn dark_reference_scales_with_integration_time() {
    let head = SimulatedHead::vis(Scene::Flat(2000));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();
    instrument.take_dark_reference().await.unwrap();

    instrument.apply_settings(manual(20_000)).await.unwrap();
    let spectrum = instrument.acquire(false).await.unwrap();

    let dark = 2000.0 - floor_offset();
    assert_all_close(&spectrum.values, dark - 2.0 * dark, 1e-6);
}

#[tokio::test(start_paused = true)]
async fn reflectance_is_percent_of_the_white_standard() {
    let head = SimulatedHead::vis(Scene::Flat(1600));
    let mut instrument = connect(&head).await;
    let settings = AcquisitionSettings {
        plot_mode: PlotMode::ReflectanceTransmittance,
        ..manual(10_000)
    };
    instrument.apply_settings(settings).await.unwrap();

    instrument.take_dark_reference().await.unwrap();
    head.set_scene(Scene::Flat(9000));
    instrument.take_light_reference().await.unwrap();
    assert!(instrument.references().can_compute_reflectance());

    let white = instrument.acquire(true).await.unwrap();
    assert_all_close(&white.values, 100.0, 1e-9);

    head.set_scene(Scene::Flat(5300));
    let half = instrument.acquire(true).await.unwrap();
    assert_all_close(&half.values, 50.0, 1e-9);
    assert_eq!(half.totals, Totals::None);
}

#[tokio::test(start_paused = true)]
async fn reflectance_without_light_reference_falls_back_to_dark_subtraction() {
    let head = SimulatedHead::vis(Scene::Flat(1600));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();
    instrument.take_dark_reference().await.unwrap();

    head.set_scene(Scene::Flat(2600));
    let spectrum = instrument.acquire(true).await.unwrap();
    assert_all_close(&spectrum.values, 1000.0, 1e-6);
}

#[tokio::test(start_paused = true)]
async fn hot_pixels_are_stored_on_the_head_and_avoided() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;

    instrument.add_hot_pixels(&[300, 301]).await.unwrap();
    assert_eq!(head.with(|s| s.hot_pixels.clone()), vec![300, 301]);
    assert!(
        instrument
            .wavelength_table()
            .anchors()
            .iter()
            .all(|a| a.pixel != 300 && a.pixel != 301)
    );

    assert!(matches!(
        instrument.add_hot_pixels(&[1024]).await,
        Err(SpectroError::InvalidSetting(_))
    ));

    // a fresh session picks the list up from the head
    let reconnected = connect(&head).await;
    assert_eq!(reconnected.hot_pixels(), instrument.hot_pixels());

    instrument.clear_hot_pixels().await.unwrap();
    assert!(head.with(|s| s.hot_pixels.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn lamp_calibration_turns_counts_into_irradiance() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();

    let lamp = LampTable::parse("lamp output, W/m2/nm\n300 1.0\n1100 1.0\n").unwrap();
    let scan = instrument.take_calibration_scan().await.unwrap();
    instrument.calibrate_from_lamp(&lamp, &scan).await.unwrap();
    assert_eq!(head.with(|s| s.calibration.as_ref().map(Vec::len)), Some(482));

    let settings = AcquisitionSettings {
        plot_mode: PlotMode::EnergyFlux,
        ..manual(10_000)
    };
    instrument.apply_settings(settings).await.unwrap();
    let spectrum = instrument.acquire(false).await.unwrap();
    assert_all_close(&spectrum.values, 1.0, 1e-5);

    let Totals::Energy { total, fraction, red_far_red } = spectrum.totals else {
        panic!("expected energy totals, got {:?}", spectrum.totals);
    };
    assert!((total - 301.0).abs() < 1e-2);
    assert!((fraction - 101.0 / 301.0).abs() < 1e-6);
    assert!((red_far_red - 1.0).abs() < 1e-6);
    assert_eq!(spectrum.to_flat().len(), 481 + 1 + 3);

    // a longer exposure collects more counts for the same irradiance
    instrument.apply_settings(AcquisitionSettings {
        plot_mode: PlotMode::EnergyFlux,
        ..manual(20_000)
    })
    .await
    .unwrap();
    let spectrum = instrument.acquire(false).await.unwrap();
    assert_all_close(&spectrum.values, 0.5, 1e-5);

    let reconnected = connect(&head).await;
    assert!(reconnected.irradiance_calibration().is_some());

    instrument.clear_irradiance_calibration().await.unwrap();
    assert!(head.with(|s| s.calibration.is_none()));
}

#[tokio::test(start_paused = true)]
async fn photon_mode_reports_six_totals() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();
    let lamp = LampTable::parse("300 1.0\n1100 1.0\n").unwrap();
    let scan = instrument.take_calibration_scan().await.unwrap();
    instrument.calibrate_from_lamp(&lamp, &scan).await.unwrap();

    instrument
        .apply_settings(AcquisitionSettings {
            plot_mode: PlotMode::PhotonFlux,
            ..manual(10_000)
        })
        .await
        .unwrap();
    let spectrum = instrument.acquire(false).await.unwrap();

    assert!(matches!(spectrum.totals, Totals::Photon { .. }));
    assert_eq!(spectrum.to_flat().len(), 481 + 1 + 6);
    // µmol grows with wavelength at constant energy
    assert!(spectrum.values[480] > spectrum.values[0]);
}

#[tokio::test(start_paused = true)]
async fn settings_are_pushed_only_when_changed() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;
    let before = head.count_requests(Opcode::SetIntegrationTime);

    instrument.apply_settings(manual(10_000)).await.unwrap();
    assert_eq!(head.count_requests(Opcode::SetIntegrationTime), before);

    instrument
        .apply_settings(AcquisitionSettings {
            scans_to_average: 4,
            ..manual(50_000)
        })
        .await
        .unwrap();
    assert_eq!(head.count_requests(Opcode::SetIntegrationTime), before + 1);
    assert_eq!(head.with(|s| s.scans_to_average), 4);
    assert_eq!(instrument.scans_to_average(), 4);

    let invalid = AcquisitionSettings {
        scans_to_average: 0,
        ..manual(50_000)
    };
    assert!(instrument.apply_settings(invalid).await.is_err());
    assert_eq!(instrument.scans_to_average(), 4);
}

#[tokio::test(start_paused = true)]
async fn alias_becomes_the_display_name() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;
    let unnamed = instrument.name();

    instrument.set_alias("Roof").await.unwrap();
    assert_eq!(instrument.name(), "Roof");
    assert_eq!(head.with(|s| s.alias.clone()).as_deref(), Some("Roof"));

    instrument.set_alias("").await.unwrap();
    assert_eq!(instrument.name(), unnamed);
}

#[tokio::test(start_paused = true)]
async fn cancelled_acquisition_returns_none() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(500_000)).await.unwrap();

    let (stop_tx, mut stop) = tokio::sync::watch::channel(false);
    stop_tx.send(true).unwrap();
    assert!(instrument.acquire_until(false, &mut stop).await.unwrap().is_none());
    assert_eq!(instrument.state(), AcquisitionState::Idle);
    assert!(instrument.last_spectrum().is_none());
}

#[tokio::test(start_paused = true)]
async fn cancelled_scan_does_not_answer_later_requests() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(10_000)).await.unwrap();

    let (stop_tx, mut stop) = tokio::sync::watch::channel(false);
    stop_tx.send(true).unwrap();
    assert!(instrument.acquire_until(false, &mut stop).await.unwrap().is_none());
    assert!(head.with(|s| s.pending.is_empty()));

    assert_eq!(instrument.read_temperature().await.unwrap(), HEAD_TEMPERATURE);

    head.set_scene(Scene::Flat(6000));
    let spectrum = instrument.acquire(false).await.unwrap();
    assert_all_close(&spectrum.values, 6000.0 - floor_offset(), 1e-6);
    assert_eq!(instrument.state(), AcquisitionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn reference_scans_run_to_completion() {
    let head = SimulatedHead::vis(Scene::Flat(5000));
    let mut instrument = connect(&head).await;
    instrument.apply_settings(manual(20_000)).await.unwrap();

    instrument.take_dark_reference().await.unwrap();
    let dark = instrument.references().dark.as_ref().unwrap();
    assert_eq!(dark.integration_us, 20_000);
    assert_eq!(head.count_requests(Opcode::GetSpectrum), 1);
}
