use log::{debug, info};
use snafu::prelude::*;

use std::time::{Duration, Instant};

use crate::{AlreadySubmittedSnafu, SurveyResult};

/// The submission state of one visitor session.
///
/// A session starts `Unsubmitted`. A failed submission leaves it there so the
/// same answers can be sent again. A successful one moves it to `Submitted`,
/// which holds the confirmation until the display duration has elapsed; the
/// session then starts over with a blank form.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum Session {
    #[default]
    Unsubmitted,
    Submitted { at: Instant },
}

impl Session {
    pub fn new() -> Session {
        Session::Unsubmitted
    }

    pub fn accepts_submission(&self) -> bool {
        matches!(self, Session::Unsubmitted)
    }

    /// Records a successful submission.
    pub fn submitted(self, at: Instant) -> SurveyResult<Session> {
        ensure!(self.accepts_submission(), AlreadySubmittedSnafu {});
        info!("submitted: confirmation starts");
        Ok(Session::Submitted { at })
    }

    /// How long the confirmation still has to be displayed.
    pub fn remaining(&self, now: Instant, display: Duration) -> Option<Duration> {
        match self {
            Session::Unsubmitted => None,
            Session::Submitted { at } => {
                let elapsed = now.saturating_duration_since(*at);
                display.checked_sub(elapsed).filter(|d| !d.is_zero())
            }
        }
    }

    /// Moves back to a blank form once the confirmation has been shown long
    /// enough.
    pub fn tick(self, now: Instant, display: Duration) -> Session {
        match self {
            Session::Submitted { .. } if self.remaining(now, display).is_none() => {
                debug!("tick: confirmation elapsed, new form");
                Session::Unsubmitted
            }
            s => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SurveyError;

    const DISPLAY: Duration = Duration::from_secs(5);

    #[test]
    fn submission_moves_to_confirmation() {
        let t0 = Instant::now();
        let s = Session::new().submitted(t0).unwrap();
        assert!(!s.accepts_submission());
        assert_eq!(s.remaining(t0, DISPLAY), Some(DISPLAY));
    }

    #[test]
    fn second_submission_is_rejected() {
        let t0 = Instant::now();
        let s = Session::new().submitted(t0).unwrap();
        assert!(matches!(
            s.submitted(t0),
            Err(SurveyError::AlreadySubmitted {})
        ));
    }

    #[test]
    fn resets_after_display_duration() {
        let t0 = Instant::now();
        let s = Session::new().submitted(t0).unwrap();
        let s = s.tick(t0 + Duration::from_secs(4), DISPLAY);
        assert!(!s.accepts_submission());
        let s = s.tick(t0 + DISPLAY, DISPLAY);
        assert_eq!(s, Session::Unsubmitted);
    }

    #[test]
    fn unsubmitted_is_left_alone() {
        let s = Session::new().tick(Instant::now(), DISPLAY);
        assert!(s.accepts_submission());
        assert_eq!(s.remaining(Instant::now(), DISPLAY), None);
    }
}
