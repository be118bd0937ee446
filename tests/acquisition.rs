use std::fs;
use std::io::{Cursor, ErrorKind};
use std::time::Duration;

use voltlog::{
    export_session, session_file_name, spawn_watcher, stop_signal, Acquisition,
    AcquisitionConfig, AcquisitionError, MockTransport,
};

fn config_for(dir: &std::path::Path) -> AcquisitionConfig {
    AcquisitionConfig {
        port: "mock".into(),
        settle_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(1),
        output_dir: dir.to_path_buf(),
        ..AcquisitionConfig::default()
    }
}

#[test]
fn session_round_trip_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let (handle, mut token) = stop_signal();

    let mut script: Vec<String> = vec!["Arduino ready\r\n".into()];
    for i in 0..12 {
        script.push(format!("DATA,{i},1.0,1.0,1.0,1.0,1.0\r\n"));
    }
    script.push("DATA,0.5,xx,1,1,1,1\r\n".into());
    let transport = MockTransport::new(script).on_drained(move || handle.signal());

    let session = Acquisition::new(transport, config.clone())
        .run(&mut token)
        .unwrap();
    assert_eq!(session.len(), 13);

    let report = export_session(&session, &config.output_dir).unwrap();
    assert_eq!(
        report.path,
        dir.path().join(session_file_name(session.started_at()))
    );
    // Only the first row (A0 = 0) is below 0.2.
    assert_eq!(report.summary.total, 13);
    assert_eq!(report.summary.faulty, 1);

    let text = fs::read_to_string(&report.path).unwrap();
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 14);
    assert_eq!(rows[0], "timestamp,A0,A1,A2,A3,A4,A5,fault");
    assert!(rows[1].ends_with(",0.0,1.0,1.0,1.0,1.0,1.0,1"));
    assert!(rows[12].ends_with(",11.0,1.0,1.0,1.0,1.0,1.0,0"));
    assert!(rows[13].ends_with(",0.5,,1.0,1.0,1.0,1.0,0"));
}

#[test]
fn operator_stop_before_data_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, mut token) = stop_signal();
    spawn_watcher(Cursor::new(b"\n".to_vec()), handle)
        .unwrap()
        .join()
        .unwrap();

    let session = Acquisition::new(
        MockTransport::new(Vec::<Vec<u8>>::new()),
        config_for(dir.path()),
    )
    .run(&mut token)
    .unwrap();

    let err = export_session(&session, dir.path()).unwrap_err();
    assert!(matches!(err, AcquisitionError::EmptySession));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn unplugged_board_aborts_session() {
    let dir = tempfile::tempdir().unwrap();
    let (_handle, mut token) = stop_signal();
    let transport =
        MockTransport::new(["DATA,1,1,1,1,1,1\n", "DATA,1,1"]).disconnect_when_drained();

    let err = Acquisition::new(transport, config_for(dir.path()))
        .run(&mut token)
        .unwrap_err();
    assert!(err.is_transport());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn failing_reads_abort_with_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let (_handle, mut token) = stop_signal();
    let transport =
        MockTransport::new(["DATA,1,1,1,1,1,1\n"]).failing_reads(ErrorKind::BrokenPipe);
    let closed = transport.closed_flag();

    let err = Acquisition::new(transport, config_for(dir.path()))
        .run(&mut token)
        .unwrap_err();
    assert!(err.is_transport());
    assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
}
