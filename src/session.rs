//! The player's whole mutable state, changed only through explicit events.
//!
//! A session owns the input text, the generation [`Phase`] and the error
//! slot. Playback lives inside `Phase::Ready`, so a loading session can
//! never carry a storyboard, and a stale generation result is recognized by
//! its [`RequestToken`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{StoryResult, StoryboardError};
use crate::playback::{PlaybackController, Transition};
use crate::schema::{Frame, Storyboard};

/// Identifies one generation request. Only the latest token can complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Loading {
        request: RequestToken,
    },
    Ready {
        storyboard: Arc<Storyboard>,
        playback: PlaybackController,
    },
    /// The last generation failed; the message sits in the error slot.
    Failed,
}

#[derive(Debug, Clone)]
pub struct Session {
    input: String,
    default_input: String,
    phase: Phase,
    error: Option<StoryboardError>,
    issued: u64,
    show_comments: bool,
}

impl Session {
    pub fn new(default_input: impl Into<String>) -> Self {
        let default_input = default_input.into();
        Self {
            input: default_input.clone(),
            default_input,
            phase: Phase::Idle,
            error: None,
            issued: 0,
            show_comments: true,
        }
    }

    /// A session that starts with `storyboard` already loaded.
    pub fn with_storyboard(default_input: impl Into<String>, storyboard: Storyboard) -> Self {
        let mut session = Self::new(default_input);
        session.bind(Arc::new(storyboard));
        session
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn error(&self) -> Option<&StoryboardError> {
        self.error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    pub fn storyboard(&self) -> Option<&Arc<Storyboard>> {
        match &self.phase {
            Phase::Ready { storyboard, .. } => Some(storyboard),
            _ => None,
        }
    }

    pub fn playback(&self) -> Option<&PlaybackController> {
        match &self.phase {
            Phase::Ready { playback, .. } => Some(playback),
            _ => None,
        }
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        match &self.phase {
            Phase::Ready {
                storyboard,
                playback,
            } => storyboard.frame(playback.current_index()),
            _ => None,
        }
    }

    /// Navigation keys only apply to a loaded storyboard with frames.
    pub fn can_navigate(&self) -> bool {
        self.playback().is_some_and(|playback| !playback.is_inert())
    }

    pub fn can_submit(&self) -> bool {
        !self.is_loading() && !self.input.trim().is_empty()
    }

    pub fn wants_timer(&self) -> bool {
        self.playback().is_some_and(PlaybackController::wants_timer)
    }

    pub fn show_comments(&self) -> bool {
        self.show_comments
    }

    pub fn toggle_comments(&mut self) {
        self.show_comments = !self.show_comments;
    }

    /// Replaces the input text. Ignored while a request is in flight.
    pub fn set_input(&mut self, text: impl Into<String>) {
        if !self.is_loading() {
            self.input = text.into();
        }
    }

    pub fn push_input(&mut self, ch: char) {
        if !self.is_loading() {
            self.input.push(ch);
        }
    }

    pub fn pop_input(&mut self) {
        if !self.is_loading() {
            self.input.pop();
        }
    }

    /// Starts a generation request for the current input.
    ///
    /// Blank input fills the error slot and leaves everything else as it
    /// was. Otherwise the previous storyboard and error are dropped and the
    /// session enters `Loading` under a fresh token.
    pub fn begin_request(&mut self) -> StoryResult<RequestToken> {
        if self.input.trim().is_empty() {
            let error = StoryboardError::empty_input();
            self.error = Some(error.clone());
            return Err(error);
        }

        let request = self.issue();
        self.error = None;
        self.phase = Phase::Loading { request };
        info!(request = request.get(), "generation started");
        Ok(request)
    }

    /// Applies a generation result. Returns `false` when `request` is no
    /// longer the one the session is waiting for.
    pub fn complete(&mut self, request: RequestToken, result: StoryResult<Storyboard>) -> bool {
        if self.phase != (Phase::Loading { request }) {
            debug!(request = request.get(), "discarding stale generation result");
            return false;
        }

        match result {
            Ok(storyboard) => {
                info!(
                    request = request.get(),
                    frames = storyboard.frame_count(),
                    "storyboard ready"
                );
                self.bind(Arc::new(storyboard));
            }
            Err(error) => {
                warn!(request = request.get(), code = error.code(), %error, "generation failed");
                self.error = Some(error);
                self.phase = Phase::Failed;
            }
        }
        true
    }

    pub fn next(&mut self) -> Transition {
        self.drive(PlaybackController::next)
    }

    pub fn prev(&mut self) -> Transition {
        self.drive(PlaybackController::prev)
    }

    pub fn play_pause(&mut self) -> Transition {
        self.drive(PlaybackController::play_pause)
    }

    /// One autoplay step.
    pub fn tick(&mut self) -> Transition {
        self.drive(PlaybackController::tick)
    }

    /// Back to the first frame, paused. Storyboard, input and error stay.
    pub fn rewind(&mut self) -> Transition {
        self.drive(PlaybackController::reset)
    }

    /// Drops the storyboard and error, restores the default input and
    /// invalidates any in-flight request.
    pub fn clear_all(&mut self) {
        if self.is_loading() {
            self.issue();
        }
        self.phase = Phase::Idle;
        self.error = None;
        self.input.clone_from(&self.default_input);
        debug!("session cleared");
    }

    /// Rewinds when a storyboard is loaded, clears everything otherwise.
    pub fn reset(&mut self) {
        if self.storyboard().is_some() {
            self.rewind();
        } else {
            self.clear_all();
        }
    }

    fn issue(&mut self) -> RequestToken {
        self.issued += 1;
        RequestToken(self.issued)
    }

    fn bind(&mut self, storyboard: Arc<Storyboard>) {
        let playback = PlaybackController::new(storyboard.frame_count());
        self.phase = Phase::Ready {
            storyboard,
            playback,
        };
    }

    /// Runs a playback operation followed by the end-of-playback check.
    fn drive(&mut self, operation: fn(&mut PlaybackController) -> Transition) -> Transition {
        let Phase::Ready { playback, .. } = &mut self.phase else {
            return Transition::Unchanged;
        };
        let transition = operation(playback);
        match playback.settle() {
            Transition::Unchanged => transition,
            settled if !transition.changed() => settled,
            _ => transition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Frame;

    fn storyboard(frames: usize) -> Storyboard {
        Storyboard {
            title: "Bubble Sort".to_owned(),
            frames: (0..frames)
                .map(|index| Frame {
                    id: Some(index as i64 + 1),
                    narration: format!("step {index}"),
                    ..Frame::default()
                })
                .collect(),
            full_code_block: None,
        }
    }

    fn ready(frames: usize) -> Session {
        let mut session = Session::new("default");
        let token = session.begin_request().expect("token");
        assert!(session.complete(token, Ok(storyboard(frames))));
        session
    }

    #[test]
    fn blank_input_is_rejected_and_keeps_the_storyboard() {
        let mut session = ready(2);
        session.set_input("   \n");
        let error = session.begin_request().expect_err("blank");
        assert_eq!(error, StoryboardError::empty_input());
        assert_eq!(session.error(), Some(&StoryboardError::empty_input()));
        assert!(session.storyboard().is_some());
    }

    #[test]
    fn loading_drops_the_previous_storyboard_and_error() {
        let mut session = Session::new("explain");
        let first = session.begin_request().expect("token");
        session.complete(first, Err(StoryboardError::network("offline")));
        assert_eq!(session.phase(), &Phase::Failed);

        let second = session.begin_request().expect("token");
        assert!(session.is_loading());
        assert!(session.error().is_none());
        assert!(session.storyboard().is_none());
        assert!(!session.can_submit());
        assert_ne!(first, second);
    }

    #[test]
    fn success_starts_at_first_frame_paused() {
        let session = ready(3);
        let playback = session.playback().expect("playback");
        assert_eq!(playback.current_index(), 0);
        assert!(!playback.is_playing());
        assert_eq!(session.current_frame().map(|f| f.narration.as_str()), Some("step 0"));
    }

    #[test]
    fn stale_completion_never_replaces_the_current_phase() {
        let mut session = Session::new("explain");
        let old = session.begin_request().expect("old");
        let latest = session.begin_request().expect("latest");

        assert!(!session.complete(old, Ok(storyboard(5))));
        assert_eq!(session.phase(), &Phase::Loading { request: latest });

        assert!(session.complete(latest, Ok(storyboard(2))));
        assert_eq!(session.storyboard().map(|s| s.frame_count()), Some(2));
        assert!(!session.complete(latest, Ok(storyboard(9))));
    }

    #[test]
    fn clear_all_invalidates_the_in_flight_request() {
        let mut session = Session::new("default");
        session.set_input("custom");
        let token = session.begin_request().expect("token");
        session.clear_all();

        assert!(!session.complete(token, Ok(storyboard(2))));
        assert_eq!(session.phase(), &Phase::Idle);
        assert_eq!(session.input(), "default");
    }

    #[test]
    fn reset_with_storyboard_rewinds_and_keeps_error() {
        let mut session = ready(4);
        session.next();
        session.next();
        session.set_input("");
        let _ = session.begin_request();

        session.reset();
        assert_eq!(session.playback().map(|p| p.current_index()), Some(0));
        assert!(session.storyboard().is_some());
        assert!(session.error().is_some());
        assert_eq!(session.input(), "");
    }

    #[test]
    fn reset_without_storyboard_clears_everything() {
        let mut session = Session::new("default");
        session.set_input("something");
        let token = session.begin_request().expect("token");
        session.complete(token, Err(StoryboardError::upstream("boom")));

        session.reset();
        assert_eq!(session.phase(), &Phase::Idle);
        assert!(session.error().is_none());
        assert_eq!(session.input(), "default");
    }

    #[test]
    fn settle_runs_after_every_transition() {
        let mut session = ready(2);
        session.play_pause();
        assert!(session.wants_timer());
        assert_eq!(session.tick(), Transition::Moved { from: 0, to: 1 });
        assert!(!session.playback().expect("playback").is_playing());
        assert!(!session.wants_timer());
    }

    #[test]
    fn single_frame_play_settles_immediately() {
        let mut session = ready(1);
        session.play_pause();
        assert!(!session.playback().expect("playback").is_playing());
    }

    #[test]
    fn empty_storyboard_disables_navigation() {
        let mut session = ready(0);
        assert!(session.storyboard().is_some());
        assert!(!session.can_navigate());
        assert_eq!(session.play_pause(), Transition::Unchanged);
        assert!(session.current_frame().is_none());
    }

    #[test]
    fn input_is_frozen_while_loading() {
        let mut session = Session::new("abc");
        session.begin_request().expect("token");
        session.push_input('d');
        session.pop_input();
        assert_eq!(session.input(), "abc");
    }

    #[test]
    fn navigation_outside_ready_is_inert() {
        let mut session = Session::new("x");
        assert_eq!(session.next(), Transition::Unchanged);
        assert_eq!(session.rewind(), Transition::Unchanged);
    }
}
