use std::{error::Error, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn test_file_missing() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzlaner")?;

    cmd.arg("not_real.mzML").arg("-o").arg("-");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
    Ok(())
}

#[test]
fn test_malformed_time_range() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzlaner")?;

    cmd.arg("not_real.mzML").arg("-o").arg("-").args(["-r", "a-z"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range start invalid float literal",
    ));

    let mut cmd = Command::cargo_bin("mzlaner")?;

    cmd.arg("not_real.mzML").arg("-o").arg("-").args(["-r", "5-z"]);
    cmd.assert().failure().stderr(predicate::str::contains(
        "Failed to parse time range end invalid float literal",
    ));

    Ok(())
}

#[test]
fn test_malformed_target() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("mzlaner")?;

    cmd.arg("not_real.mzML").args(["--targets", "500@x"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse target time"));

    let mut cmd = Command::cargo_bin("mzlaner")?;

    cmd.arg("not_real.mzML").args(["--targets", "500"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("A target must be written as m/z@time"));
    Ok(())
}
