//! Delay between worker loop cycles.

use std::str::FromStr;
use std::time::Duration;

/// How the loop picks its inter-cycle delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Fixed,
    Exponential,
}

impl FromStr for PollMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "" => Ok(PollMode::Fixed),
            "exponential" | "backoff" => Ok(PollMode::Exponential),
            other => Err(format!(
                "WORKER_POLL_BACKOFF must be fixed or exponential, got '{}'",
                other
            )),
        }
    }
}

/// Sleep after a cycle, given how many cycles in a row have failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSchedule {
    /// Same delay after every cycle
    Fixed(Duration),
    /// `base` after a success, doubling per consecutive failure up to `max`
    Backoff { base: Duration, max: Duration },
}

impl PollSchedule {
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        match *self {
            PollSchedule::Fixed(delay) => delay,
            PollSchedule::Backoff { base, max } => {
                let factor = 2u32.checked_pow(consecutive_failures).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(max)
            }
        }
    }
}
