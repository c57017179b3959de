use std::{error::Error, fmt::Display, num::ParseFloatError, str::FromStr};

use serde::{Deserialize, Serialize};

pub(crate) fn non_negative_float_f32(s: &str) -> Result<f32, String> {
    let value = s.parse::<f32>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

pub(crate) fn positive_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value <= 0.0 {
        Err(format!("`{s}` is not greater than zero"))
    } else {
        Ok(value)
    }
}

/// An m/z and retention time to search for a feature around, written `mz@time`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub mz: f64,
    pub time: f64,
}

impl Target {
    pub fn new(mz: f64, time: f64) -> Self {
        Self { mz, time }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.mz, self.time)
    }
}

#[derive(Debug)]
pub enum TargetParseError {
    MissingTime,
    MalformedMZ(ParseFloatError),
    MalformedTime(ParseFloatError),
}

impl Display for TargetParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetParseError::MissingTime => {
                write!(f, "A target must be written as m/z@time")
            }
            TargetParseError::MalformedMZ(e) => write!(f, "Failed to parse target m/z {e}"),
            TargetParseError::MalformedTime(e) => write!(f, "Failed to parse target time {e}"),
        }
    }
}

impl Error for TargetParseError {}

impl FromStr for Target {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mz, time) = s.trim().split_once('@').ok_or(TargetParseError::MissingTime)?;
        let mz = mz.trim().parse().map_err(TargetParseError::MalformedMZ)?;
        let time = time.trim().parse().map_err(TargetParseError::MalformedTime)?;
        Ok(Self { mz, time })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_target_fromstr() -> Result<(), TargetParseError> {
        let t: Target = "500.25@12.5".parse()?;
        assert_eq!(t, Target::new(500.25, 12.5));
        let t: Target = " 800 @ 3 ".parse()?;
        assert_eq!(t, Target::new(800.0, 3.0));
        assert_eq!(t.to_string(), "800@3");

        assert!(matches!("500.25".parse::<Target>(), Err(TargetParseError::MissingTime)));
        assert!(matches!("x@1".parse::<Target>(), Err(TargetParseError::MalformedMZ(_))));
        assert!(matches!("1@x".parse::<Target>(), Err(TargetParseError::MalformedTime(_))));
        Ok(())
    }

    #[test]
    fn test_numeric_validators() {
        assert_eq!(non_negative_float_f32("0"), Ok(0.0));
        assert!(non_negative_float_f32("-1").is_err());
        assert!(positive_float_f64("0").is_err());
        assert_eq!(positive_float_f64("0.5"), Ok(0.5));
    }
}
