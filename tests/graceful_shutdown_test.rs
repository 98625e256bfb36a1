//! Interrupt handling: the run stops, the instrument goes home and the files are uploaded.

mod common;

use common::{options, reflector, Station};
use geocom_daq::adapters::MockReply;
use geocom_daq::clock::TokioClock;
use geocom_daq::journal::Level;
use geocom_daq::survey::SurveyState;
use geocom_daq::units::gon_to_rad;
use geocom_daq::upload::RecordingUploader;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn interrupt_homes_and_uploads_even_if_upload_fails() {
    let station = Station::with_uploader(RecordingUploader::failing());
    // the full measurement never answers, so the run is stuck in the read
    station.connector.set_default(2167, MockReply::Silence);
    let mut surveyor = station.surveyor(options(3)).await;
    surveyor
        .load_aims(vec![reflector("P1", 10.0, 100.0)], true)
        .unwrap();

    let summary = surveyor
        .run_until(tokio::time::sleep(Duration::from_secs(5)))
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.sets_completed, 0);
    assert_eq!(surveyor.state(), SurveyState::Finished);

    let commands = station.connector.commands();
    assert_eq!(
        commands.last().unwrap(),
        &format!("%R1Q,9027:0,{},1,0,0", gon_to_rad(200.0))
    );
    assert_eq!(station.uploader.calls().len(), 1);
    assert!(station
        .journal
        .contains(Level::Info, "Interrupted, shutting down"));
    assert!(station
        .journal
        .contains(Level::Error, "Failed uploading files"));
}

#[tokio::test]
async fn run_that_finishes_first_is_not_interrupted() {
    let station = Station::new();
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(vec![reflector("P1", 10.0, 100.0)], false)
        .unwrap();

    let summary = surveyor
        .run_until(std::future::pending::<()>())
        .await
        .unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.sets_completed, 1);
    // only the end-of-set upload
    assert_eq!(station.uploader.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn interrupt_during_initialization_homes_and_uploads() {
    let station = Station::new();
    // the instrument never answers the first initialization command
    station.connector.set_default(2006, MockReply::Silence);
    let mut surveyor = station.surveyor(options(1)).await;

    let initialized = tokio::select! {
        result = surveyor.initialize() => Some(result),
        () = tokio::time::sleep(Duration::from_secs(5)) => None,
    };
    assert!(initialized.is_none());

    let summary = surveyor.interrupt().await;

    assert!(summary.interrupted);
    assert_eq!(surveyor.state(), SurveyState::Finished);
    assert_eq!(
        station.connector.commands().last().unwrap(),
        &format!("%R1Q,9027:0,{},1,0,0", gon_to_rad(200.0))
    );
    assert_eq!(station.uploader.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_gives_up_homing_when_the_port_is_gone() {
    let station = Station::new();
    let mut surveyor = station
        .surveyor_with_clock(options(1), Arc::new(TokioClock))
        .await;
    // the link drops on the home command and the port never opens again
    station.connector.set_default(9027, MockReply::Disconnect);
    station.connector.fail_next_opens(u32::MAX);

    let started = tokio::time::Instant::now();
    surveyor.shutdown().await;

    assert!(started.elapsed() >= surveyor.options().shutdown_timeout);
    assert_eq!(surveyor.state(), SurveyState::Finished);
    assert_eq!(station.connector.opens(), 1);
    assert!(station
        .journal
        .contains(Level::Warning, "Home position not reached within 120s"));
    assert_eq!(station.uploader.calls().len(), 1);
}
