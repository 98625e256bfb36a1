//! Orchestrator scenarios against the simulated instrument.

mod common;

use common::{options, reflector, reflectorless, Station, INIT_SEQUENCE, REFLECTORLESS_AIM, REFLECTOR_AIM};
use geocom_daq::adapters::MockReply;
use geocom_daq::error::SurveyError;
use geocom_daq::journal::Level;
use geocom_daq::measurement::{format_value, SENTINEL};
use geocom_daq::survey::{RunOptions, SurveyState};
use geocom_daq::units::{gon_to_rad, rad_to_gon};
use std::time::Duration;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[tokio::test]
async fn healthy_set_measures_every_aim_in_order() {
    let station = Station::new();
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(
            vec![reflector("P1", 10.0, 100.0), reflectorless("Wall", 50.0, 99.0)],
            false,
        )
        .unwrap();

    let summary = surveyor.run().await.unwrap();

    assert_eq!(summary.sets_completed, 1);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.aims_skipped, 0);
    assert!(!summary.interrupted);
    assert_eq!(surveyor.state(), SurveyState::Finished);

    let expected: Vec<u16> = INIT_SEQUENCE
        .iter()
        .chain(REFLECTOR_AIM.iter())
        .chain(REFLECTORLESS_AIM.iter())
        .copied()
        .collect();
    assert_eq!(station.connector.rpc_log(), expected);

    // reflector aims position onto the target, reflectorless ones onto the angles
    let commands = station.connector.commands();
    assert!(commands.contains(&format!(
        "%R1Q,9027:{},{},1,1,0",
        gon_to_rad(10.0),
        gon_to_rad(100.0)
    )));
    assert!(commands.contains(&format!(
        "%R1Q,9027:{},{},1,0,0",
        gon_to_rad(50.0),
        gon_to_rad(99.0)
    )));
    assert!(commands.contains(&format!(
        "%R1Q,9037:{},{},0",
        gon_to_rad(2.0),
        gon_to_rad(2.0)
    )));
    assert!(commands.contains(&"%R1Q,2167:15000,1".to_string()));

    let records = station.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0][1], "P1");
    assert_eq!(records[1][1], "Wall");
    assert_eq!(records[0][2], format_value(Some(rad_to_gon(1.0))));
    assert_eq!(records[0][3], format_value(Some(rad_to_gon(1.0001))));
    assert_eq!(records[0][6], "12.34568");
    assert_eq!(records[0][9], "21.50000");

    // settle before each read, pacing after each record
    assert_eq!(station.clock.sleeps(), vec![secs(2), secs(1), secs(2), secs(1)]);
    assert_eq!(station.uploader.calls().len(), 1);
}

#[tokio::test]
async fn second_circle_measures_mirrored_aims_in_reverse() {
    let station = Station::new();
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(
            vec![reflectorless("P1", 10.0, 100.0), reflectorless("P2", 20.0, 98.0)],
            true,
        )
        .unwrap();

    surveyor.run().await.unwrap();

    let names: Vec<String> = station.records().into_iter().map(|r| r[1].clone()).collect();
    assert_eq!(names, vec!["P1", "P2", "P2", "P1"]);

    let positioning: Vec<String> = station
        .connector
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("%R1Q,9027:"))
        .collect();
    assert_eq!(
        positioning[2],
        format!("%R1Q,9027:{},{},1,0,0", gon_to_rad(220.0), gon_to_rad(302.0))
    );
    assert_eq!(
        positioning[3],
        format!("%R1Q,9027:{},{},1,0,0", gon_to_rad(210.0), gon_to_rad(300.0))
    );
}

#[tokio::test]
async fn distance_error_becomes_sentinel_after_inner_retries() {
    let station = Station::new();
    station
        .connector
        .set_default(2167, MockReply::full_measurement(1285, 0.0));
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(vec![reflector("P1", 10.0, 100.0)], false)
        .unwrap();

    let summary = surveyor.run().await.unwrap();
    assert_eq!(summary.records_written, 1);

    let log = station.connector.rpc_log();
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2008).count(), 2);
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2167).count(), 2);

    let record = &station.records()[0];
    assert_eq!(record[6], SENTINEL);
    // angles, inclines and temperature come from their own reads
    assert_eq!(record[3], format_value(Some(rad_to_gon(1.0001))));
    assert_eq!(record[7], format_value(Some(rad_to_gon(0.00001))));
    assert_eq!(record[9], "21.50000");

    assert!(station.journal.contains(Level::Info, "Retrying"));
    assert!(station
        .journal
        .contains(Level::Error, "Distance measurement failed (1285)"));
    // no reinitialization for a content fault in the reads
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2006).count(), 1);
}

#[tokio::test]
async fn distance_recovers_on_second_attempt() {
    let station = Station::new();
    station
        .connector
        .script(2167, MockReply::full_measurement(1285, 0.0));
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(vec![reflectorless("P1", 10.0, 100.0)], false)
        .unwrap();

    surveyor.run().await.unwrap();

    assert_eq!(station.records()[0][6], "12.34568");
    assert_eq!(station.clock.sleeps(), vec![secs(2), secs(2), secs(1)]);
}

#[tokio::test]
async fn angle_and_temperature_errors_mark_their_columns() {
    let station = Station::new();
    station.connector.script(2003, MockReply::angles(1283));
    station
        .connector
        .script(5011, MockReply::temperature(1285, 0.0));
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(vec![reflectorless("P1", 10.0, 100.0)], false)
        .unwrap();

    surveyor.run().await.unwrap();

    let record = &station.records()[0];
    assert_eq!(&record[2..6], &[SENTINEL; 4]);
    assert_eq!(record[6], "12.34568");
    assert_eq!(record[9], SENTINEL);
    assert!(station
        .journal
        .contains(Level::Error, "Angle response failed (1283)"));
    assert!(station
        .journal
        .contains(Level::Error, "Internal temperature measurement failed (1285)"));
}

#[tokio::test]
async fn initialization_retries_after_one_short_backoff() {
    let station = Station::new();
    station.connector.script(2006, MockReply::rc(1));
    let mut surveyor = station.surveyor(options(1)).await;

    surveyor.initialize().await.unwrap();

    assert_eq!(surveyor.state(), SurveyState::Ready);
    assert_eq!(station.clock.sleeps(), vec![secs(10)]);
    assert_eq!(
        station.connector.rpc_log(),
        vec![2006, 2006, 2148, 2020, 17019]
    );
    assert!(station
        .journal
        .contains(Level::Info, "Initializing failed (incline switch returned 1), trying again in 10s"));
    assert!(station
        .journal
        .contains(Level::Info, "Successfully (re)initialized TS"));
}

#[tokio::test]
async fn exhausted_initialization_uploads_and_stops() {
    let station = Station::new();
    station.connector.set_default(2148, MockReply::rc(1));
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(vec![reflectorless("P1", 10.0, 100.0)], false)
        .unwrap();

    let err = surveyor.run().await.unwrap_err();

    assert!(matches!(
        err,
        SurveyError::InitializationExhausted { attempts: 4 }
    ));
    assert_eq!(surveyor.state(), SurveyState::Finished);
    assert_eq!(
        station.clock.sleeps(),
        vec![secs(10), secs(90), secs(600)]
    );
    assert_eq!(station.uploader.calls().len(), 1);
    assert!(station.records().is_empty());
    assert!(station
        .journal
        .contains(Level::Error, "Initializing failed, stopping program"));
}

#[tokio::test]
async fn failed_positioning_skips_the_aim_and_reinitializes() {
    let station = Station::new();
    station.connector.script(9027, MockReply::rc(8710));
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(
            vec![reflector("P1", 10.0, 100.0), reflectorless("P2", 20.0, 100.0)],
            false,
        )
        .unwrap();

    let summary = surveyor.run().await.unwrap();

    assert_eq!(summary.aims_skipped, 1);
    assert_eq!(summary.records_written, 1);
    assert_eq!(station.records()[0][1], "P2");

    let expected: Vec<u16> = INIT_SEQUENCE
        .iter()
        .chain(&[18005, 17021, 17008, 9027])
        .chain(INIT_SEQUENCE.iter())
        .chain(REFLECTORLESS_AIM.iter())
        .copied()
        .collect();
    assert_eq!(station.connector.rpc_log(), expected);
    assert!(station
        .journal
        .contains(Level::Error, "Measuring P1 aborted: positioning returned 8710"));
}

#[tokio::test(start_paused = true)]
async fn silent_instrument_aborts_the_aim() {
    let station = Station::new();
    station.connector.set_default(2003, MockReply::Silence);
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(vec![reflectorless("P1", 10.0, 100.0)], false)
        .unwrap();

    let summary = surveyor.run().await.unwrap();

    assert_eq!(summary.aims_skipped, 1);
    assert_eq!(summary.records_written, 0);
    assert!(station.records().is_empty());
    let log = station.connector.rpc_log();
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2003).count(), 3);
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2006).count(), 2);
    assert!(station
        .journal
        .contains(Level::Error, "GeoCom did not receive response"));
}

#[tokio::test(start_paused = true)]
async fn silent_distance_trigger_skips_the_inner_retries() {
    let station = Station::new();
    station.connector.set_default(2008, MockReply::Silence);
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(vec![reflectorless("P1", 10.0, 100.0)], false)
        .unwrap();

    let summary = surveyor.run().await.unwrap();

    assert_eq!(summary.aims_skipped, 1);
    assert!(station.records().is_empty());
    let log = station.connector.rpc_log();
    // one command's retries, no second distance attempt, no read
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2008).count(), 3);
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2167).count(), 0);
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2003).count(), 0);
    // reinitialized after the abandoned aim
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2006).count(), 2);
    // the settle wait only follows a trigger that answered
    assert!(station.clock.sleeps().is_empty());
}

#[tokio::test(start_paused = true)]
async fn silent_full_measurement_read_aborts_the_aim() {
    let station = Station::new();
    station.connector.set_default(2167, MockReply::Silence);
    let mut surveyor = station.surveyor(options(1)).await;
    surveyor
        .load_aims(vec![reflectorless("P1", 10.0, 100.0)], false)
        .unwrap();

    let summary = surveyor.run().await.unwrap();

    assert_eq!(summary.aims_skipped, 1);
    assert_eq!(summary.records_written, 0);
    let log = station.connector.rpc_log();
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2008).count(), 1);
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2167).count(), 3);
    assert_eq!(log.iter().filter(|&&rpc| rpc == 2003).count(), 0);
    assert_eq!(log.iter().filter(|&&rpc| rpc == 5011).count(), 0);
    assert_eq!(station.clock.sleeps(), vec![secs(2)]);
}

#[tokio::test]
async fn interval_waits_for_the_rest_and_goes_home() {
    let station = Station::new();
    let mut surveyor = station
        .surveyor(RunOptions {
            interval: Some(secs(600)),
            ..options(2)
        })
        .await;
    surveyor
        .load_aims(vec![reflectorless("P1", 10.0, 100.0)], false)
        .unwrap();

    let summary = surveyor.run().await.unwrap();

    assert_eq!(summary.sets_completed, 2);
    // set: settle 2 s + pacing 1 s, then the rest of the interval; none after the last set
    assert_eq!(
        station.clock.sleeps(),
        vec![secs(2), secs(1), secs(597), secs(2), secs(1)]
    );
    let home = format!("%R1Q,9027:0,{},1,0,0", gon_to_rad(200.0));
    let homes = station
        .connector
        .commands()
        .into_iter()
        .filter(|c| *c == home)
        .count();
    assert_eq!(homes, 2);
    assert_eq!(station.uploader.calls().len(), 2);
    assert!(station.journal.contains(Level::Info, "Sleeping for 597s"));
}

#[tokio::test]
async fn overlong_set_does_not_wait() {
    let station = Station::new();
    let mut surveyor = station
        .surveyor(RunOptions {
            interval: Some(secs(2)),
            ..options(2)
        })
        .await;
    surveyor
        .load_aims(vec![reflectorless("P1", 10.0, 100.0)], false)
        .unwrap();

    surveyor.run().await.unwrap();

    assert_eq!(
        station.clock.sleeps(),
        vec![secs(2), secs(1), secs(2), secs(1)]
    );
    assert!(station.journal.contains(Level::Warning, "Interval too short"));
}

#[tokio::test]
async fn run_without_aims_is_refused() {
    let station = Station::new();
    let mut surveyor = station.surveyor(options(1)).await;

    assert!(matches!(surveyor.run().await, Err(SurveyError::NoAims)));
    assert!(matches!(
        surveyor.load_aims(Vec::new(), true),
        Err(SurveyError::NoAims)
    ));
    assert!(station.connector.rpc_log().is_empty());
}
