//! Time windows for bookable resources.
//!
//! A reservation applies to a half-open interval. Two granularities exist:
//!
//! - **Nightly** (`Nights`): date-only stays for rooms; the checkout date
//!   is exclusive, so back-to-back stays on the same room never overlap
//! - **Slotted** (`Slot`): clock-time intervals for tables and service
//!   slots
//!
//! Inventory items carry no time axis at all; their reservations have no
//! window. Overlap is always checked with the half-open rule
//! `a.start < b.end && b.start < a.end`.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReserveError;

/// Half-open interval a reservation applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    /// Date-granular stay: `[check_in, check_out)`, checkout day exclusive.
    Nights {
        /// First occupied night
        check_in: NaiveDate,
        /// Checkout date (exclusive)
        check_out: NaiveDate,
    },
    /// Clock-granular slot: `[starts_at, ends_at)`.
    Slot {
        /// Start of the slot (inclusive)
        starts_at: DateTime<Utc>,
        /// End of the slot (exclusive)
        ends_at: DateTime<Utc>,
    },
}

impl TimeWindow {
    /// A single-night window `[date, date + 1)`.
    ///
    /// Used when naming the exact night a multi-night reservation
    /// conflicted on.
    #[must_use]
    pub fn single_night(date: NaiveDate) -> Self {
        Self::Nights {
            check_in: date,
            check_out: date.checked_add_days(Days::new(1)).unwrap_or(date),
        }
    }

    /// Rejects empty and inverted intervals.
    ///
    /// # Errors
    ///
    /// Returns [`ReserveError::InvalidWindow`] when `end <= start`.
    pub fn validate(&self) -> Result<(), ReserveError> {
        let valid = match self {
            Self::Nights {
                check_in,
                check_out,
            } => check_in < check_out,
            Self::Slot { starts_at, ends_at } => starts_at < ends_at,
        };
        if valid {
            Ok(())
        } else {
            Err(ReserveError::InvalidWindow {
                reason: format!("window end must be after start ({self})"),
            })
        }
    }

    /// Half-open overlap check.
    ///
    /// Windows of different granularity never overlap; a resource only
    /// ever carries reservations of its own granularity.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Nights {
                    check_in: a_start,
                    check_out: a_end,
                },
                Self::Nights {
                    check_in: b_start,
                    check_out: b_end,
                },
            ) => a_start < b_end && b_start < a_end,
            (
                Self::Slot {
                    starts_at: a_start,
                    ends_at: a_end,
                },
                Self::Slot {
                    starts_at: b_start,
                    ends_at: b_end,
                },
            ) => a_start < b_end && b_start < a_end,
            _ => false,
        }
    }

    /// Every night of a nightly stay, in order. Empty for slot windows.
    pub fn nights(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let (start, count) = match self {
            Self::Nights {
                check_in,
                check_out,
            } => {
                let span = (*check_out - *check_in).num_days().max(0);
                #[allow(clippy::cast_sign_loss)] // clamped non-negative above
                (*check_in, span as u64)
            }
            Self::Slot { .. } => (NaiveDate::MIN, 0),
        };
        (0..count).filter_map(move |offset| start.checked_add_days(Days::new(offset)))
    }

    /// First night of `self` that `other` also covers, if the two nightly
    /// windows overlap. `None` for slot windows or disjoint stays.
    #[must_use]
    pub fn first_overlap_night(&self, other: &Self) -> Option<NaiveDate> {
        if !self.overlaps(other) {
            return None;
        }
        match (self, other) {
            (Self::Nights { check_in: a, .. }, Self::Nights { check_in: b, .. }) => {
                Some(*a.max(b))
            }
            _ => None,
        }
    }

    /// Materialization keys for the availability index: one per night for
    /// stays, a single key for slots.
    #[must_use]
    pub fn buckets(&self) -> Vec<Bucket> {
        match self {
            Self::Nights { .. } => self.nights().map(Bucket::Night).collect(),
            Self::Slot { starts_at, ends_at } => vec![Bucket::Slot {
                starts_at: *starts_at,
                ends_at: *ends_at,
            }],
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nights {
                check_in,
                check_out,
            } => write!(f, "{check_in}..{check_out}"),
            Self::Slot { starts_at, ends_at } => write!(f, "{starts_at}..{ends_at}"),
        }
    }
}

/// Key of one materialized availability row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    /// One night of a nightly resource
    Night(NaiveDate),
    /// One slot of a slotted resource
    Slot {
        /// Start of the slot (inclusive)
        starts_at: DateTime<Utc>,
        /// End of the slot (exclusive)
        ends_at: DateTime<Utc>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn nights(check_in: &str, check_out: &str) -> TimeWindow {
        TimeWindow::Nights {
            check_in: date(check_in),
            check_out: date(check_out),
        }
    }

    #[test]
    fn back_to_back_stays_do_not_overlap() {
        let first = nights("2024-06-01", "2024-06-03");
        let second = nights("2024-06-03", "2024-06-05");
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn shared_night_overlaps() {
        let a = nights("2024-06-01", "2024-06-03");
        let b = nights("2024-06-02", "2024-06-04");
        assert!(a.overlaps(&b));
        assert_eq!(b.first_overlap_night(&a), Some(date("2024-06-02")));
    }

    #[test]
    fn nights_iterates_half_open() {
        let stay = nights("2024-06-01", "2024-06-04");
        let all: Vec<NaiveDate> = stay.nights().collect();
        assert_eq!(
            all,
            vec![date("2024-06-01"), date("2024-06-02"), date("2024-06-03")]
        );
    }

    #[test]
    fn empty_window_is_rejected() {
        assert!(nights("2024-06-03", "2024-06-03").validate().is_err());
        assert!(nights("2024-06-04", "2024-06-03").validate().is_err());
        assert!(nights("2024-06-03", "2024-06-04").validate().is_ok());
    }

    #[test]
    fn slot_overlap_is_half_open() {
        let lunch = TimeWindow::Slot {
            starts_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap(),
        };
        let dinner = TimeWindow::Slot {
            starts_at: Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2024, 6, 1, 16, 0, 0).unwrap(),
        };
        assert!(!lunch.overlaps(&dinner));
    }

    #[test]
    fn mixed_granularity_never_overlaps() {
        let stay = nights("2024-06-01", "2024-06-03");
        let slot = TimeWindow::Slot {
            starts_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap(),
        };
        assert!(!stay.overlaps(&slot));
    }

    #[test]
    fn buckets_cover_every_night() {
        let stay = nights("2024-06-01", "2024-06-03");
        assert_eq!(
            stay.buckets(),
            vec![
                Bucket::Night(date("2024-06-01")),
                Bucket::Night(date("2024-06-02")),
            ]
        );
    }

    proptest! {
        /// Overlap is symmetric and agrees with the nights the two stays share.
        #[test]
        fn overlap_matches_shared_nights(
            a_start in 0u64..400,
            a_len in 1u64..30,
            b_start in 0u64..400,
            b_len in 1u64..30,
        ) {
            let epoch = date("2024-01-01");
            let mk = |start: u64, len: u64| TimeWindow::Nights {
                check_in: epoch.checked_add_days(Days::new(start)).unwrap(),
                check_out: epoch.checked_add_days(Days::new(start + len)).unwrap(),
            };
            let a = mk(a_start, a_len);
            let b = mk(b_start, b_len);

            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));

            let shared = a.nights().any(|night| b.nights().any(|other| night == other));
            prop_assert_eq!(a.overlaps(&b), shared);
        }
    }
}
