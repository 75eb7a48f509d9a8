//! Typing animation: reveals buffered text at a steady pace, independent of how the
//! network delivers it.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Lifecycle of an [`Animator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    /// Nothing pending.
    Idle,
    /// Pending text is being revealed.
    Draining,
    /// Cancelled; waiting for the final flush.
    Aborted,
    /// Final text was handed out.
    Finished,
}

/// Pending-text buffer drained one slice per tick.
///
/// Every character fed is eventually returned: either revealed through [`Animator::tick`]
/// or included in the single [`Animator::finish`] result.
///
/// # Examples
///
/// ```
/// use parley_chat::animation::Animator;
///
/// let mut animator = Animator::new(2);
/// animator.feed("hello");
/// assert_eq!(animator.shown(), "");
/// assert_eq!(animator.tick().as_deref(), Some("hel"));
/// assert_eq!(animator.shown(), "hel");
/// assert_eq!(animator.finish().as_deref(), Some("hello"));
/// assert_eq!(animator.finish(), None);
/// ```
#[derive(Debug)]
pub struct Animator {
    shown: String,
    pending: String,
    pending_chars: usize,
    speed: u32,
    closed: bool,
    state: AnimationState,
}

impl Animator {
    /// `speed` divides the pending length each tick; it is clamped to at least 1.
    pub fn new(speed: u32) -> Self {
        Self {
            shown: String::new(),
            pending: String::new(),
            pending_chars: 0,
            speed: speed.max(1),
            closed: false,
            state: AnimationState::Idle,
        }
    }

    /// Buffers `delta` without revealing it.
    pub fn feed(&mut self, delta: &str) {
        if matches!(self.state, AnimationState::Aborted | AnimationState::Finished) {
            return;
        }
        if delta.is_empty() {
            return;
        }
        self.pending.push_str(delta);
        self.pending_chars += delta.chars().count();
        self.state = AnimationState::Draining;
    }

    /// Moves the next slice from pending to shown and returns it.
    ///
    /// The slice is `max(1, round(pending / speed))` characters long.
    pub fn tick(&mut self) -> Option<String> {
        if self.state != AnimationState::Draining || self.pending_chars == 0 {
            return None;
        }
        let wanted = (self.pending_chars as f64 / f64::from(self.speed)).round() as usize;
        let count = wanted.clamp(1, self.pending_chars);
        let split = self
            .pending
            .char_indices()
            .nth(count)
            .map_or(self.pending.len(), |(idx, _)| idx);
        let slice: String = self.pending.drain(..split).collect();
        self.shown.push_str(&slice);
        self.pending_chars -= count;
        if self.pending_chars == 0 {
            self.state = AnimationState::Idle;
        }
        Some(slice)
    }

    /// Marks the producer as done; the animator keeps draining what it has.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Stops revealing. The next [`Animator::finish`] flushes the remainder.
    pub fn abort(&mut self) {
        if self.state != AnimationState::Finished {
            self.state = AnimationState::Aborted;
        }
    }

    /// Returns shown plus pending text exactly once.
    pub fn finish(&mut self) -> Option<String> {
        if self.state == AnimationState::Finished {
            return None;
        }
        self.state = AnimationState::Finished;
        let mut text = std::mem::take(&mut self.shown);
        text.push_str(&self.pending);
        self.pending.clear();
        self.pending_chars = 0;
        self.shown.clone_from(&text);
        Some(text)
    }

    /// The producer is done and nothing is left to reveal.
    pub fn is_drained(&self) -> bool {
        self.closed && self.pending_chars == 0
    }

    pub fn has_pending(&self) -> bool {
        self.state == AnimationState::Draining
    }

    pub fn shown(&self) -> &str {
        &self.shown
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }
}

/// Drives [`Animator::tick`].
#[async_trait]
pub trait TickSource: Send {
    /// Resolves when the next frame is due.
    async fn tick(&mut self);
}

/// Fixed-interval ticks from the tokio timer. Missed ticks are skipped, not bunched.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl TickSource for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Ticks pushed by a host render loop.
///
/// Once every sender is dropped the ticker resolves immediately, so a detached host
/// never stalls the request.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use parley_chat::animation::{FrameTicker, TickSource};
///
/// let (mut ticker, frames) = FrameTicker::channel(4);
/// frames.try_send(()).unwrap();
/// ticker.tick().await;
/// # }
/// ```
pub struct FrameTicker {
    frames: mpsc::Receiver<()>,
}

impl FrameTicker {
    pub fn new(frames: mpsc::Receiver<()>) -> Self {
        Self { frames }
    }

    /// Creates a ticker together with the sender the host uses to signal frames.
    pub fn channel(capacity: usize) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(rx), tx)
    }
}

#[async_trait]
impl TickSource for FrameTicker {
    async fn tick(&mut self) {
        let _ = self.frames.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fed_character_is_accounted_for() {
        let mut animator = Animator::new(3);
        let mut fed = String::new();
        for delta in ["The ", "quick ", "brown ", "fox"] {
            animator.feed(delta);
            fed.push_str(delta);
            animator.tick();
            assert_eq!(format!("{}{}", animator.shown(), animator.pending()), fed);
        }
        animator.close();
        while animator.tick().is_some() {}
        assert!(animator.is_drained());
        assert_eq!(animator.shown(), fed);
    }

    #[test]
    fn slices_respect_char_boundaries() {
        let mut animator = Animator::new(2);
        animator.feed("héllo wörld");
        let mut revealed = String::new();
        while let Some(slice) = animator.tick() {
            revealed.push_str(&slice);
        }
        assert_eq!(revealed, "héllo wörld");
    }

    #[test]
    fn slice_length_follows_rounding_rule() {
        let mut animator = Animator::new(4);
        animator.feed("abcdefghij");
        // round(10 / 4) = 3
        assert_eq!(animator.tick().as_deref(), Some("abc"));
        // round(7 / 4) = 2
        assert_eq!(animator.tick().as_deref(), Some("de"));
        // round(5 / 4) = 1
        assert_eq!(animator.tick().as_deref(), Some("f"));
    }

    #[test]
    fn finish_is_idempotent_and_flushes_pending() {
        let mut animator = Animator::new(60);
        animator.feed("partial answer");
        animator.tick();
        animator.abort();
        assert_eq!(animator.state(), AnimationState::Aborted);
        assert_eq!(animator.tick(), None);
        assert_eq!(animator.finish().as_deref(), Some("partial answer"));
        assert_eq!(animator.finish(), None);
        animator.feed("late");
        assert_eq!(animator.state(), AnimationState::Finished);
        assert_eq!(animator.shown(), "partial answer");
    }

    #[test]
    fn states_follow_the_buffer() {
        let mut animator = Animator::new(1);
        assert_eq!(animator.state(), AnimationState::Idle);
        animator.feed("ab");
        assert_eq!(animator.state(), AnimationState::Draining);
        animator.tick();
        assert_eq!(animator.state(), AnimationState::Idle);
        assert!(!animator.is_drained());
        animator.close();
        assert!(animator.is_drained());
    }

    #[tokio::test]
    async fn frame_ticker_resolves_once_host_detaches() {
        let (mut ticker, frames) = FrameTicker::channel(1);
        drop(frames);
        ticker.tick().await;
        ticker.tick().await;
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_waits_for_the_period() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(16));
        ticker.tick().await;
        let before = tokio::time::Instant::now();
        ticker.tick().await;
        assert_eq!(before.elapsed(), Duration::from_millis(16));
    }
}
