use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("dashfeed").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("series"));
}

#[test]
fn open_ended_range_is_rejected() {
    let mut cmd = Command::cargo_bin("dashfeed").unwrap();
    cmd.env("DASHFEED_WB_BASE_URL", "http://127.0.0.1:1")
        .args(["series", "--entity", "IND", "--series", "GDP=NY.GDP.MKTP.CD", "--date", "2000:"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("open-ended"));
}

#[test]
fn duplicate_series_codes_are_rejected() {
    let mut cmd = Command::cargo_bin("dashfeed").unwrap();
    cmd.args([
        "series",
        "--entity",
        "IND",
        "--series",
        "A=X",
        "--series",
        "B=X",
        "--date",
        "2000:2001",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("duplicate series code"));
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn series_online_population() {
    let mut cmd = Command::cargo_bin("dashfeed").unwrap();
    cmd.args([
        "series",
        "--entity",
        "IND",
        "--series",
        "Population=SP.POP.TOTL",
        "--date",
        "2019:2020",
        "--stats",
    ]);
    cmd.assert().success();
}
