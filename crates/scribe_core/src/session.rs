//! Session state
//!
//! The single mutable slot of a session: the current image, the most recent
//! recognition result and the status witness. Only the coordinator holds a
//! `SessionState`; background tasks never see it and hand their results back
//! through the update channel instead.

use crate::error::{Result, ScribeError};
use crate::types::{ImageId, RasterImage, RunId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Externally visible status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Acquiring,
    Recognizing,
    Ready,
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Acquiring => "acquiring",
            SessionStatus::Recognizing => "recognizing",
            SessionStatus::Ready => "ready",
            SessionStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// The run currently holding the session's single recognition slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Single { run: RunId, image: ImageId },
    Batch { run: RunId },
}

impl InFlight {
    fn run(&self) -> RunId {
        match self {
            InFlight::Single { run, .. } | InFlight::Batch { run } => *run,
        }
    }
}

/// Snapshot handed to the worker when a single-image recognition starts
#[derive(Debug, Clone)]
pub struct RecognitionTicket {
    pub run: RunId,
    pub image: Arc<RasterImage>,
}

/// What happened to a finished recognition when it was written back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result now describes the session's current image
    Applied,
    /// The image was replaced or cleared mid-flight; the result was dropped
    Superseded,
}

#[derive(Debug, Default)]
pub struct SessionState {
    current_image: Option<Arc<RasterImage>>,
    last_result_text: String,
    status: SessionStatus,
    last_error: Option<String>,
    in_flight: Option<InFlight>,
    next_run: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_image(&self) -> Option<&RasterImage> {
        self.current_image.as_deref()
    }

    pub fn result_text(&self) -> &str {
        &self.last_result_text
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True while a single recognition or a batch job holds the slot
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Replace the current image unconditionally and clear the last result
    ///
    /// Allowed while a recognition is in flight; that run's result will be
    /// discarded when it arrives.
    pub fn set_image(&mut self, image: RasterImage) {
        self.current_image = Some(Arc::new(image));
        self.last_result_text.clear();
        self.last_error = None;
        if self.in_flight.is_none() {
            self.status = SessionStatus::Idle;
        }
    }

    /// Mark an acquisition as underway (camera open, decode pending)
    pub fn begin_acquiring(&mut self) {
        if self.in_flight.is_none() {
            self.status = SessionStatus::Acquiring;
        }
    }

    /// Leave `Acquiring` without having obtained an image
    pub fn abandon_acquiring(&mut self) {
        if self.status == SessionStatus::Acquiring {
            self.status = self.resting_status();
        }
    }

    /// Record an acquisition failure; the current image is kept
    pub fn fail_acquiring(&mut self, error: &ScribeError) {
        self.last_error = Some(error.to_string());
        if self.in_flight.is_none() {
            self.status = SessionStatus::Failed;
        }
    }

    /// Claim the recognition slot for the current image
    pub fn begin_recognition(&mut self) -> Result<RecognitionTicket> {
        self.ensure_slot_free()?;
        let image = self
            .current_image
            .clone()
            .ok_or_else(|| ScribeError::invalid_state("no image loaded; acquire an image first"))?;

        let run = self.allocate_run();
        self.in_flight = Some(InFlight::Single {
            run,
            image: image.id(),
        });
        self.status = SessionStatus::Recognizing;
        self.last_error = None;
        Ok(RecognitionTicket { run, image })
    }

    /// Write a finished recognition back
    pub fn complete_recognition(&mut self, run: RunId, text: String) -> Result<Completion> {
        let target = self.release_single(run)?;
        if self.current_id() == Some(target) {
            self.last_result_text = text;
            self.status = SessionStatus::Ready;
            Ok(Completion::Applied)
        } else {
            self.status = self.resting_status();
            Ok(Completion::Superseded)
        }
    }

    /// Record a failed recognition; the image and previous text are kept
    pub fn fail_recognition(&mut self, run: RunId, error: &ScribeError) -> Result<Completion> {
        let target = self.release_single(run)?;
        if self.current_id() == Some(target) {
            self.last_error = Some(error.to_string());
            self.status = SessionStatus::Failed;
            Ok(Completion::Applied)
        } else {
            self.status = self.resting_status();
            Ok(Completion::Superseded)
        }
    }

    /// Claim the recognition slot for a batch job
    pub fn begin_batch(&mut self) -> Result<RunId> {
        self.ensure_slot_free()?;
        let run = self.allocate_run();
        self.in_flight = Some(InFlight::Batch { run });
        self.status = SessionStatus::Recognizing;
        self.last_error = None;
        Ok(run)
    }

    /// Install the combined text of a finished batch job
    pub fn complete_batch(&mut self, run: RunId, text: String) -> Result<()> {
        match self.in_flight {
            Some(InFlight::Batch { run: current }) if current == run => {
                self.in_flight = None;
                self.last_result_text = text;
                self.status = SessionStatus::Ready;
                Ok(())
            }
            _ => Err(ScribeError::invalid_state(format!(
                "no batch run {run} in flight"
            ))),
        }
    }

    /// Drop the image and the result
    pub fn clear(&mut self) {
        self.current_image = None;
        self.last_result_text.clear();
        self.last_error = None;
        if self.in_flight.is_none() {
            self.status = SessionStatus::Idle;
        }
    }

    fn ensure_slot_free(&self) -> Result<()> {
        match self.in_flight {
            Some(flight) => Err(ScribeError::invalid_state(format!(
                "recognition {} already in progress",
                flight.run()
            ))),
            None => Ok(()),
        }
    }

    fn release_single(&mut self, run: RunId) -> Result<ImageId> {
        match self.in_flight {
            Some(InFlight::Single { run: current, image }) if current == run => {
                self.in_flight = None;
                Ok(image)
            }
            _ => Err(ScribeError::invalid_state(format!(
                "no recognition run {run} in flight"
            ))),
        }
    }

    fn allocate_run(&mut self) -> RunId {
        self.next_run += 1;
        RunId(self.next_run)
    }

    fn current_id(&self) -> Option<ImageId> {
        self.current_image.as_ref().map(|img| img.id())
    }

    fn resting_status(&self) -> SessionStatus {
        if self.last_result_text.is_empty() {
            SessionStatus::Idle
        } else {
            SessionStatus::Ready
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::solid_image;

    #[test]
    fn test_recognition_without_image_is_invalid() {
        let mut session = SessionState::new();
        let err = session.begin_recognition().unwrap_err();
        assert!(matches!(err, ScribeError::InvalidState(_)));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.result_text(), "");
    }

    #[test]
    fn test_failed_begin_keeps_previous_text() {
        let mut session = SessionState::new();
        let run = session.begin_batch().unwrap();
        session.complete_batch(run, "batch text".to_string()).unwrap();

        let err = session.begin_recognition().unwrap_err();
        assert!(matches!(err, ScribeError::InvalidState(_)));
        assert_eq!(session.result_text(), "batch text");
        assert_eq!(session.status(), SessionStatus::Ready);
    }

    #[test]
    fn test_at_most_one_in_flight() {
        let mut session = SessionState::new();
        session.set_image(solid_image(4, 4, 0));
        let _ticket = session.begin_recognition().unwrap();
        assert!(matches!(
            session.begin_recognition(),
            Err(ScribeError::InvalidState(_))
        ));
        assert!(matches!(
            session.begin_batch(),
            Err(ScribeError::InvalidState(_))
        ));
        assert_eq!(session.status(), SessionStatus::Recognizing);
    }

    #[test]
    fn test_complete_sets_text_exactly() {
        let mut session = SessionState::new();
        session.set_image(solid_image(4, 4, 0));
        let ticket = session.begin_recognition().unwrap();
        let outcome = session
            .complete_recognition(ticket.run, "  Hello\nWorld \n".to_string())
            .unwrap();
        assert_eq!(outcome, Completion::Applied);
        assert_eq!(session.result_text(), "  Hello\nWorld \n");
        assert_eq!(session.status(), SessionStatus::Ready);
    }

    #[test]
    fn test_image_replaced_mid_flight_discards_result() {
        let mut session = SessionState::new();
        session.set_image(solid_image(4, 4, 0));
        let ticket = session.begin_recognition().unwrap();

        session.set_image(solid_image(6, 6, 255));
        assert_eq!(session.status(), SessionStatus::Recognizing);

        let outcome = session
            .complete_recognition(ticket.run, "stale".to_string())
            .unwrap();
        assert_eq!(outcome, Completion::Superseded);
        assert_eq!(session.result_text(), "");
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.current_image().unwrap().width(), 6);
    }

    #[test]
    fn test_same_image_reloaded_mid_flight_still_applies() {
        let mut session = SessionState::new();
        let image = solid_image(4, 4, 0);
        session.set_image(image.clone());
        let ticket = session.begin_recognition().unwrap();
        session.set_image(image);
        let outcome = session
            .complete_recognition(ticket.run, "text".to_string())
            .unwrap();
        assert_eq!(outcome, Completion::Applied);
        assert_eq!(session.result_text(), "text");
    }

    #[test]
    fn test_failure_preserves_image() {
        let mut session = SessionState::new();
        session.set_image(solid_image(4, 4, 0));
        let ticket = session.begin_recognition().unwrap();
        let err = ScribeError::Engine("boom".to_string());
        session.fail_recognition(ticket.run, &err).unwrap();
        assert_eq!(session.status(), SessionStatus::Failed);
        assert!(session.current_image().is_some());
        assert_eq!(session.last_error(), Some("recognition failed: boom"));
    }

    #[test]
    fn test_stale_run_rejected() {
        let mut session = SessionState::new();
        session.set_image(solid_image(4, 4, 0));
        let ticket = session.begin_recognition().unwrap();
        session
            .complete_recognition(ticket.run, "ok".to_string())
            .unwrap();
        assert!(session
            .complete_recognition(ticket.run, "again".to_string())
            .is_err());
        assert_eq!(session.result_text(), "ok");
    }

    #[test]
    fn test_batch_lifecycle() {
        let mut session = SessionState::new();
        let run = session.begin_batch().unwrap();
        assert_eq!(session.status(), SessionStatus::Recognizing);
        assert!(session.complete_batch(RunId(run.0 + 1), String::new()).is_err());
        session.complete_batch(run, "combined".to_string()).unwrap();
        assert_eq!(session.status(), SessionStatus::Ready);
        assert_eq!(session.result_text(), "combined");
    }

    #[test]
    fn test_acquiring_round_trip() {
        let mut session = SessionState::new();
        session.begin_acquiring();
        assert_eq!(session.status(), SessionStatus::Acquiring);
        session.abandon_acquiring();
        assert_eq!(session.status(), SessionStatus::Idle);

        session.begin_acquiring();
        session.fail_acquiring(&ScribeError::Capture("no frame".to_string()));
        assert_eq!(session.status(), SessionStatus::Failed);
    }

    #[test]
    fn test_clear_resets() {
        let mut session = SessionState::new();
        session.set_image(solid_image(4, 4, 0));
        session.clear();
        assert!(session.current_image().is_none());
        assert_eq!(session.status(), SessionStatus::Idle);
    }
}
