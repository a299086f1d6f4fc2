mod common;

use std::fs;

use assert_cmd::Command;
use common::{TestWorkspace, count, query, text};
use predicates::prelude::*;
use predicates::str::{contains, is_match};

fn gtfs_import(ws: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("gtfs-import").expect("binary exists");
    cmd.env_remove("RUST_LOG").args([
        "--backend",
        "sqlite",
        "--gtfs-dir",
        ws.feed_dir().to_str().unwrap(),
        "--database",
        ws.db_path().to_str().unwrap(),
    ]);
    cmd
}

#[test]
fn imports_feed_and_logs_swap() {
    let ws = TestWorkspace::new();
    ws.write_feed("stops.txt", "stop_id,stop_name\nS1,Luz\nS2,Sé\n");

    gtfs_import(&ws)
        .args(["--dataset", "sp_stop"])
        .assert()
        .success()
        .stdout(contains("Importing stops.txt -> sp_stop"))
        .stdout(contains("  Columns: stop_id, stop_name"))
        .stdout(contains("  Total rows loaded: 2"))
        .stdout(is_match(
            r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3} \[INFO\] Swapped tables: sp_stop_staging -> sp_stop",
        )
        .unwrap())
        .stdout(contains("Import completed: 1 succeeded, 0 failed"));

    let conn = ws.open_db();
    assert_eq!(count(&conn, "sp_stop"), 2);
}

#[test]
fn missing_feed_directory_exits_with_error() {
    let ws = TestWorkspace::new();
    let mut cmd = Command::cargo_bin("gtfs-import").expect("binary exists");
    cmd.args([
        "--backend",
        "sqlite",
        "--gtfs-dir",
        ws.path().join("nowhere").to_str().unwrap(),
        "--database",
        ws.db_path().to_str().unwrap(),
    ])
    .assert()
    .code(1)
    .stderr(contains("GTFS directory not found"))
    .stdout(contains("GTFS directory not found").not());
    assert!(!ws.db_path().exists());
}

#[test]
fn partial_failure_still_exits_zero() {
    let ws = TestWorkspace::new();
    ws.write_feed("stops.txt", "stop_id\nS1\n");

    gtfs_import(&ws)
        .args(["--dataset", "sp_stop", "--dataset", "sp_trip"])
        .assert()
        .success()
        .stdout(contains("[WARNING]").and(contains("File not found")))
        .stdout(contains("Import completed: 1 succeeded, 1 failed"));
}

#[test]
fn strict_mode_exits_two_on_dataset_failure() {
    let ws = TestWorkspace::new();
    ws.write_feed("stops.txt", "stop_id\nS1\n");

    gtfs_import(&ws)
        .args([
            "--dataset",
            "sp_stop",
            "--dataset",
            "sp_trip",
            "--fail-on-dataset-error",
        ])
        .assert()
        .code(2)
        .stdout(contains("sp_trip"));

    // The dataset that did load is still committed.
    let conn = ws.open_db();
    assert_eq!(count(&conn, "sp_stop"), 1);
}

#[test]
fn strict_mode_without_failures_exits_zero() {
    let ws = TestWorkspace::new();
    ws.write_feed("routes.txt", "route_id,route_type\nR1,3\n");

    gtfs_import(&ws)
        .args(["--dataset", "sp_routes", "--fail-on-dataset-error"])
        .assert()
        .success();
}

#[test]
fn plan_prints_columns_without_touching_store() {
    let ws = TestWorkspace::new();
    ws.write_feed("stops.txt", "stop_id,stop_lat,stop_lon\nS1,-23.5,-46.6\n");

    gtfs_import(&ws)
        .args(["--dataset", "sp_stop", "--plan"])
        .assert()
        .success()
        .stdout(contains("sp_stop <- stops.txt"))
        .stdout(contains("2  stop_lat  DECIMAL(10,6)"))
        .stdout(contains("1  stop_id   VARCHAR(255)"));
    assert!(!ws.db_path().exists());
}

#[test]
fn summary_json_lists_every_dataset() {
    let ws = TestWorkspace::new();
    ws.write_feed("calendar.txt", "service_id,monday,start_date\nWKD,1,20240101\nSAB,0,20240101\n");
    let summary = ws.path().join("summary.json");

    gtfs_import(&ws)
        .args([
            "--dataset",
            "sp_calendar",
            "--dataset",
            "sp_calendar_dates",
            "--summary-json",
            summary.to_str().unwrap(),
        ])
        .assert()
        .success();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary).expect("read summary"))
            .expect("parse summary");
    let datasets = parsed["datasets"].as_array().expect("datasets array");
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets[0]["dataset"], "sp_calendar");
    assert_eq!(datasets[0]["status"], "succeeded");
    assert_eq!(datasets[0]["rows"], 2);
    assert_eq!(datasets[1]["dataset"], "sp_calendar_dates");
    assert_eq!(datasets[1]["status"], "failed");
    assert_eq!(datasets[1]["kind"], "source_missing");
}

#[test]
fn unknown_dataset_is_rejected() {
    let ws = TestWorkspace::new();
    gtfs_import(&ws)
        .args(["--dataset", "sp_agency"])
        .assert()
        .code(1)
        .stderr(contains("sp_agency"));
}

#[test]
fn custom_registry_drives_the_import() {
    let ws = TestWorkspace::new();
    ws.write_feed("agency.txt", "agency_id,agency_name,agency_rank\nA1,SPTrans,1\n");
    let registry = ws.write(
        "registry.yaml",
        "datasets:\n  - name: sp_agency\n    file: agency.txt\n    column_types:\n      agency_rank: INT\n",
    );

    gtfs_import(&ws)
        .args(["--registry", registry.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Import completed: 1 succeeded, 0 failed"));

    let conn = ws.open_db();
    assert_eq!(
        query(&conn, "SELECT type FROM pragma_table_info('sp_agency') WHERE name = 'agency_rank'"),
        vec![vec![text("INT")]]
    );
}

#[test]
fn invalid_registry_exits_with_error() {
    let ws = TestWorkspace::new();
    let registry = ws.write(
        "registry.yaml",
        "datasets:\n  - name: sp_agency\n    file: agency.txt\n    column_types:\n      agency_id: BLOB\n",
    );
    gtfs_import(&ws)
        .args(["--registry", registry.to_str().unwrap()])
        .assert()
        .code(1)
        .stderr(contains("registry"));
}

#[cfg(not(feature = "mysql"))]
#[test]
fn mysql_backend_requires_feature() {
    let ws = TestWorkspace::new();
    Command::cargo_bin("gtfs-import")
        .expect("binary exists")
        .args([
            "--backend",
            "mysql",
            "--gtfs-dir",
            ws.feed_dir().to_str().unwrap(),
        ])
        .assert()
        .code(1)
        .stderr(contains("MySQL backend").and(contains("bus@2013").not()));
}

#[test]
fn progress_lines_follow_the_interval() {
    let ws = TestWorkspace::new();
    let mut feed = String::from("trip_id,stop_id,stop_sequence\n");
    for i in 1..=25 {
        feed.push_str(&format!("T1,S{i},{i}\n"));
    }
    ws.write_feed("stop_times.txt", &feed);

    gtfs_import(&ws)
        .args([
            "--dataset",
            "sp_stop_times",
            "--batch-size",
            "5",
            "--progress-interval",
            "10",
        ])
        .assert()
        .success()
        .stdout(contains("  Loaded 10 rows..."))
        .stdout(contains("  Loaded 20 rows..."))
        .stdout(contains("Loaded 15 rows").not())
        .stdout(contains("  Total rows loaded: 25"));
}

#[test]
fn invalid_option_values_exit_one() {
    let ws = TestWorkspace::new();
    gtfs_import(&ws)
        .args(["--batch-size", "0"])
        .assert()
        .code(1)
        .stderr(contains("batch size must be at least 1"));
    gtfs_import(&ws)
        .args(["--port", "abc"])
        .assert()
        .code(1)
        .stderr(contains("--port"));
    assert!(!ws.db_path().exists());
}

#[test]
fn help_exits_zero() {
    let mut cmd = Command::cargo_bin("gtfs-import").expect("binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("--gtfs-dir"));
}
