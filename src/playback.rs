/// Current frame and autoplay flag over `frame_count` frames. The index
/// stays within `0..frame_count`; with zero frames every operation is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackController {
    current_index: usize,
    is_playing: bool,
    frame_count: usize,
}

/// What a playback operation did, so callers can tell a no-op apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: usize, to: usize },
    Started,
    Stopped,
    Restarted,
    Unchanged,
}

impl Transition {
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl PlaybackController {
    pub fn new(frame_count: usize) -> Self {
        Self {
            current_index: 0,
            is_playing: false,
            frame_count,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn is_inert(&self) -> bool {
        self.frame_count == 0
    }

    pub fn at_first(&self) -> bool {
        self.current_index == 0
    }

    pub fn at_last(&self) -> bool {
        self.frame_count > 0 && self.current_index == self.frame_count - 1
    }

    /// 1-based position for display; 0 when there are no frames.
    pub fn position(&self) -> usize {
        if self.is_inert() {
            0
        } else {
            self.current_index + 1
        }
    }

    pub fn next(&mut self) -> Transition {
        if self.current_index + 1 < self.frame_count {
            let from = self.current_index;
            self.current_index += 1;
            Transition::Moved {
                from,
                to: self.current_index,
            }
        } else {
            self.stop()
        }
    }

    pub fn prev(&mut self) -> Transition {
        if self.at_first() {
            return Transition::Unchanged;
        }
        let from = self.current_index;
        self.current_index -= 1;
        Transition::Moved {
            from,
            to: self.current_index,
        }
    }

    pub fn play_pause(&mut self) -> Transition {
        if self.is_inert() {
            return Transition::Unchanged;
        }

        if !self.is_playing && self.at_last() {
            self.current_index = 0;
            self.is_playing = true;
            return Transition::Restarted;
        }

        if self.is_playing {
            self.stop()
        } else {
            self.is_playing = true;
            Transition::Started
        }
    }

    /// Back to the first frame, paused.
    pub fn reset(&mut self) -> Transition {
        let changed = self.is_playing || self.current_index != 0;
        self.is_playing = false;
        self.current_index = 0;
        if changed {
            Transition::Restarted
        } else {
            Transition::Unchanged
        }
    }

    /// One autoplay step; identical to [`PlaybackController::next`].
    pub fn tick(&mut self) -> Transition {
        self.next()
    }

    /// The end-of-playback check run after every transition: playing on the
    /// last frame stops instead of waiting for another tick.
    pub fn settle(&mut self) -> Transition {
        if self.is_playing && (self.at_last() || self.is_inert()) {
            self.stop()
        } else {
            Transition::Unchanged
        }
    }

    /// Whether an autoplay timer should be running right now.
    pub fn wants_timer(&self) -> bool {
        self.is_playing && self.current_index + 1 < self.frame_count
    }

    fn stop(&mut self) -> Transition {
        if self.is_playing {
            self.is_playing = false;
            Transition::Stopped
        } else {
            Transition::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaybackController, Transition};

    #[test]
    fn next_clamps_at_last_frame_and_stops_playback() {
        let mut playback = PlaybackController::new(3);
        playback.play_pause();
        assert_eq!(playback.next(), Transition::Moved { from: 0, to: 1 });
        assert_eq!(playback.next(), Transition::Moved { from: 1, to: 2 });
        assert!(playback.is_playing());
        assert_eq!(playback.next(), Transition::Stopped);
        assert_eq!(playback.current_index(), 2);
        assert!(!playback.is_playing());
        assert_eq!(playback.next(), Transition::Unchanged);
    }

    #[test]
    fn prev_is_a_no_op_at_first_frame() {
        let mut playback = PlaybackController::new(2);
        assert_eq!(playback.prev(), Transition::Unchanged);
        playback.next();
        assert_eq!(playback.prev(), Transition::Moved { from: 1, to: 0 });
        assert!(playback.at_first());
    }

    #[test]
    fn play_pause_at_end_replays_from_start() {
        let mut playback = PlaybackController::new(4);
        for _ in 0..3 {
            playback.next();
        }
        assert!(playback.at_last());
        assert_eq!(playback.play_pause(), Transition::Restarted);
        assert_eq!(playback.current_index(), 0);
        assert!(playback.is_playing());
        assert_eq!(playback.play_pause(), Transition::Stopped);
    }

    #[test]
    fn autoplay_ticks_stop_at_last_frame_without_wrapping() {
        let mut playback = PlaybackController::new(3);
        playback.play_pause();

        playback.tick();
        assert_eq!((playback.current_index(), playback.is_playing()), (1, true));
        playback.tick();
        assert_eq!(playback.current_index(), 2);
        assert!(!playback.wants_timer());
        playback.tick();
        assert_eq!((playback.current_index(), playback.is_playing()), (2, false));
    }

    #[test]
    fn settle_stops_playing_on_last_frame() {
        let mut playback = PlaybackController::new(2);
        playback.play_pause();
        playback.tick();
        assert!(playback.is_playing());
        assert_eq!(playback.settle(), Transition::Stopped);
        assert!(!playback.is_playing());
        assert_eq!(playback.settle(), Transition::Unchanged);
    }

    #[test]
    fn single_frame_storyboard_never_keeps_a_timer() {
        let mut playback = PlaybackController::new(1);
        assert_eq!(playback.play_pause(), Transition::Restarted);
        assert!(!playback.wants_timer());
        playback.settle();
        assert!(!playback.is_playing());
    }

    #[test]
    fn empty_storyboard_is_inert() {
        let mut playback = PlaybackController::new(0);
        assert_eq!(playback.play_pause(), Transition::Unchanged);
        assert_eq!(playback.next(), Transition::Unchanged);
        assert_eq!(playback.prev(), Transition::Unchanged);
        assert_eq!(playback.position(), 0);
        assert!(!playback.is_playing());
    }

    #[test]
    fn reset_rewinds_and_pauses() {
        let mut playback = PlaybackController::new(5);
        playback.next();
        playback.next();
        playback.play_pause();
        assert_eq!(playback.reset(), Transition::Restarted);
        assert_eq!(playback.current_index(), 0);
        assert!(!playback.is_playing());
        assert_eq!(playback.reset(), Transition::Unchanged);
    }
}
