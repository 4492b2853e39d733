//! Overlap detection on a 1440-minute occupancy table

use thiserror::Error;

use super::RestTimePair;
use crate::clock::{MINUTES_PER_DAY, TimeOfDay};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OverlapError {
    #[error("window {index} starts and stops at the same time ({time})")]
    ZeroLength { index: usize, time: TimeOfDay },

    #[error("windows {first} and {second} overlap at {at}")]
    Overlap {
        first: usize,
        second: usize,
        at: TimeOfDay,
    },

    #[error("window {index} covers the whole day")]
    FullDay { index: usize },
}

/// Check that no window is empty and no two windows share a minute.
///
/// Window `i` occupies `[start, stop)`, wrapping past midnight when
/// `stop < start`.
pub fn validate(pairs: &[RestTimePair]) -> Result<(), OverlapError> {
    if let Some((index, pair)) = pairs.iter().enumerate().find(|(_, p)| p.start == p.stop) {
        return Err(OverlapError::ZeroLength {
            index,
            time: pair.start,
        });
    }

    let mut owner: Vec<Option<usize>> = vec![None; MINUTES_PER_DAY];

    for (index, pair) in pairs.iter().enumerate() {
        let stop = pair.stop.minute_of_day();
        let mut minute = pair.start.minute_of_day();
        let mut covered = 0;

        while minute != stop {
            if covered == MINUTES_PER_DAY {
                return Err(OverlapError::FullDay { index });
            }
            if let Some(first) = owner[minute] {
                return Err(OverlapError::Overlap {
                    first,
                    second: index,
                    at: TimeOfDay::from_minute_of_day(minute),
                });
            }
            owner[minute] = Some(index);
            minute = (minute + 1) % MINUTES_PER_DAY;
            covered += 1;
        }
    }

    Ok(())
}
