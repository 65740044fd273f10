//! Year animation and view state.
//!
//! Handlers never mutate view state directly: they produce [`Event`]s which
//! [`reduce`] folds into a fresh [`ViewState`]. [`Stepper`] owns the single
//! timer and queues events so a slider move can never interleave with a tick.

use crate::data::Metric;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Current year within a `[start_year, end_year]` range, plus the play flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationState {
    pub current_year: i32,
    pub start_year: i32,
    pub end_year: i32,
    pub is_playing: bool,
}

impl AnimationState {
    pub fn new(start_year: i32, end_year: i32) -> Self {
        let (start_year, end_year) = (start_year.min(end_year), start_year.max(end_year));
        Self {
            current_year: start_year,
            start_year,
            end_year,
            is_playing: false,
        }
    }

    /// No-op while playing. A halted animation restarts from `start_year`.
    pub fn play(self) -> Self {
        if self.is_playing {
            return self;
        }
        let current_year = if self.current_year >= self.end_year {
            self.start_year
        } else {
            self.current_year
        };
        Self {
            current_year,
            is_playing: true,
            ..self
        }
    }

    pub fn pause(self) -> Self {
        Self {
            is_playing: false,
            ..self
        }
    }

    /// Advance one year; stops the instant `end_year` is reached and never
    /// steps past it
    pub fn tick(self) -> Self {
        if !self.is_playing {
            return self;
        }
        if self.current_year >= self.end_year {
            return self.halted();
        }
        let current_year = self.current_year + 1;
        Self {
            current_year,
            is_playing: current_year < self.end_year,
            ..self
        }
    }

    /// Slider input, clamped into range. Landing on `end_year` stops playback.
    pub fn seek(self, year: i32) -> Self {
        Self {
            current_year: year.clamp(self.start_year, self.end_year),
            ..self
        }
        .halted()
    }

    /// Swap the range, keeping the play flag and clamping the year. Landing
    /// on the new `end_year` stops playback.
    pub fn with_range(self, start_year: i32, end_year: i32) -> Self {
        let range = AnimationState::new(start_year, end_year);
        Self {
            current_year: self.current_year.clamp(range.start_year, range.end_year),
            start_year: range.start_year,
            end_year: range.end_year,
            is_playing: self.is_playing,
        }
        .halted()
    }

    /// Clears the play flag once the year sits at the end of the range
    fn halted(self) -> Self {
        Self {
            is_playing: self.is_playing && self.current_year < self.end_year,
            ..self
        }
    }
}

/// The whole view: renderers are pure functions of this value
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub animation: AnimationState,
    pub metric: Metric,
    pub top_n: usize,
    /// Country whose drill-down is open
    pub selected: Option<String>,
}

impl ViewState {
    pub fn new(metric: Metric, top_n: usize) -> Self {
        let (start, end) = metric.default_years();
        Self {
            animation: AnimationState::new(start, end),
            metric,
            top_n,
            selected: None,
        }
    }

    pub fn year(&self) -> i32 {
        self.animation.current_year
    }

    pub fn is_playing(&self) -> bool {
        self.animation.is_playing
    }
}

/// Everything that can change the view
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Play,
    Pause,
    TogglePlay,
    Tick,
    SetYear(i32),
    StepYear(i32),
    /// Keeps playing; the range follows the metric
    SetMetric(Metric),
    SetTopN(usize),
    Select(String),
    CloseDrillDown,
}

/// The single state transition function
pub fn reduce(state: &ViewState, event: Event) -> ViewState {
    let mut next = state.clone();
    match event {
        Event::Play => next.animation = state.animation.play(),
        Event::Pause => next.animation = state.animation.pause(),
        Event::TogglePlay => {
            next.animation = if state.animation.is_playing {
                state.animation.pause()
            } else {
                state.animation.play()
            }
        }
        Event::Tick => next.animation = state.animation.tick(),
        Event::SetYear(year) => next.animation = state.animation.seek(year),
        Event::StepYear(delta) => next.animation = state.animation.seek(state.year().saturating_add(delta)),
        Event::SetMetric(metric) => {
            let (start, end) = metric.default_years();
            next.metric = metric;
            next.animation = state.animation.with_range(start, end);
        }
        Event::SetTopN(n) => next.top_n = n.max(1),
        Event::Select(country) => next.selected = Some(country),
        Event::CloseDrillDown => next.selected = None,
    }
    next
}

/// Fixed-interval timer. Only armed while the animation plays.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    last: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arms on first call, then fires once per elapsed interval
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.last {
            None => {
                self.last = Some(now);
                false
            }
            Some(last) if now.duration_since(last) >= self.interval => {
                self.last = Some(now);
                true
            }
            Some(_) => false,
        }
    }

    pub fn disarm(&mut self) {
        self.last = None;
    }
}

/// Owns the view state, the event queue and the one ticker
pub struct Stepper {
    state: ViewState,
    pending: VecDeque<Event>,
    ticker: Ticker,
}

impl Stepper {
    pub fn new(state: ViewState, interval: Duration) -> Self {
        Self {
            state,
            pending: VecDeque::new(),
            ticker: Ticker::new(interval),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Queue an event; it is applied on the next [`Stepper::update`]
    pub fn dispatch(&mut self, event: Event) {
        self.pending.push_back(event);
    }

    /// Apply queued events in order, then a tick if one is due.
    /// Returns whether the state changed.
    pub fn update(&mut self, now: Instant) -> bool {
        let before = self.state.clone();
        while let Some(event) = self.pending.pop_front() {
            self.state = reduce(&self.state, event);
        }
        if self.state.is_playing() && self.ticker.fire(now) {
            self.state = reduce(&self.state, Event::Tick);
        }
        if !self.state.is_playing() {
            self.ticker.disarm();
        }
        self.state != before
    }

    /// Tick immediately, bypassing the timer. Returns the year that tick
    /// displayed, `None` when stopped.
    pub fn advance(&mut self) -> Option<i32> {
        if !self.state.is_playing() {
            return None;
        }
        let shown = self.state.year();
        self.state = reduce(&self.state, Event::Tick);
        Some(shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(start: i32, end: i32) -> ViewState {
        ViewState {
            animation: AnimationState::new(start, end),
            metric: Metric::Population,
            top_n: 10,
            selected: None,
        }
    }

    #[test]
    fn test_runs_to_end_without_extra_tick() {
        let mut stepper = Stepper::new(state(2000, 2005), Duration::from_millis(10));
        stepper.dispatch(Event::Play);
        stepper.update(Instant::now());

        let mut shown = Vec::new();
        while let Some(year) = stepper.advance() {
            shown.push(year);
        }
        assert_eq!(shown, vec![2000, 2001, 2002, 2003, 2004]);
        assert_eq!(stepper.state().year(), 2005);
        assert!(!stepper.state().is_playing());
        assert_eq!(stepper.advance(), None);

        // Restart from the halted state resets to the start
        let restarted = reduce(stepper.state(), Event::Play);
        assert_eq!(restarted.year(), 2000);
        assert!(restarted.is_playing());
    }

    #[test]
    fn test_pause_resumes_without_reset() {
        let s = reduce(&state(2000, 2020), Event::Play);
        let s = reduce(&s, Event::Tick);
        let s = reduce(&s, Event::Tick);
        let s = reduce(&s, Event::Pause);
        assert_eq!(s.year(), 2002);
        assert_eq!(reduce(&s, Event::Tick), s);
        let s = reduce(&s, Event::Play);
        assert_eq!(s.year(), 2002);
        assert!(s.is_playing());
    }

    #[test]
    fn test_play_while_playing_is_a_noop() {
        let s = reduce(&state(2000, 2020), Event::Play);
        let s = reduce(&s, Event::Tick);
        assert_eq!(reduce(&s, Event::Play), s);
    }

    #[test]
    fn test_metric_change_keeps_playing_with_new_range() {
        let mut s = reduce(&state(2000, 2020), Event::Play);
        for _ in 0..19 {
            s = reduce(&s, Event::Tick);
        }
        assert_eq!(s.year(), 2019);
        let s = reduce(&s, Event::SetMetric(Metric::Gdp));
        assert_eq!(s.animation.end_year, 2018);
        assert_eq!(s.year(), 2018);
        // Clamped onto the new end: halted, and a late tick stays put
        assert!(!s.is_playing());
        let s = reduce(&s, Event::Tick);
        assert_eq!(s.year(), 2018);
        assert!(!s.is_playing());

        // Inside the new range the animation keeps going
        let mut s = reduce(&state(2000, 2020), Event::Play);
        for _ in 0..5 {
            s = reduce(&s, Event::Tick);
        }
        let s = reduce(&s, Event::SetMetric(Metric::Gdp));
        assert!(s.is_playing());
        assert_eq!(s.year(), 2005);
        let s = reduce(&s, Event::Tick);
        assert_eq!(s.year(), 2006);
    }

    #[test]
    fn test_seek_to_end_never_ticks_past_it() {
        let s = reduce(&state(2000, 2020), Event::Play);
        let s = reduce(&s, Event::SetYear(2020));
        assert_eq!(s.year(), 2020);
        assert!(!s.is_playing());
        let s = reduce(&s, Event::Tick);
        assert_eq!(s.year(), 2020);

        let s = reduce(&state(2000, 2020), Event::Play);
        let s = reduce(&s, Event::StepYear(25));
        let s = reduce(&s, Event::Tick);
        assert_eq!(s.year(), 2020);
        assert!(!s.is_playing());

        // Seeking inside the range keeps playing
        let s = reduce(&state(2000, 2020), Event::Play);
        let s = reduce(&s, Event::SetYear(2010));
        assert!(s.is_playing());
        assert_eq!(reduce(&s, Event::Tick).year(), 2011);
    }

    #[test]
    fn test_tick_at_end_stops_without_stepping() {
        let at_end = AnimationState {
            current_year: 2005,
            start_year: 2000,
            end_year: 2005,
            is_playing: true,
        };
        let next = at_end.tick();
        assert_eq!(next.current_year, 2005);
        assert!(!next.is_playing);
    }

    #[test]
    fn test_slider_is_clamped() {
        let s = reduce(&state(2000, 2020), Event::SetYear(1990));
        assert_eq!(s.year(), 2000);
        let s = reduce(&s, Event::StepYear(50));
        assert_eq!(s.year(), 2020);
    }

    #[test]
    fn test_selection_and_top_n() {
        let s = reduce(&state(2000, 2020), Event::Select("Chile".into()));
        assert_eq!(s.selected.as_deref(), Some("Chile"));
        let s = reduce(&s, Event::SetTopN(0));
        assert_eq!(s.top_n, 1);
        let s = reduce(&s, Event::CloseDrillDown);
        assert_eq!(s.selected, None);
    }

    #[test]
    fn test_ticker_fires_once_per_interval() {
        let mut stepper = Stepper::new(state(2000, 2005), Duration::from_millis(100));
        let t0 = Instant::now();
        stepper.dispatch(Event::Play);
        assert!(stepper.update(t0));
        assert_eq!(stepper.state().year(), 2000);

        assert!(!stepper.update(t0 + Duration::from_millis(50)));
        assert!(stepper.update(t0 + Duration::from_millis(100)));
        assert_eq!(stepper.state().year(), 2001);

        // A queued slider move lands before the due tick, never mid-tick
        stepper.dispatch(Event::SetYear(2003));
        stepper.update(t0 + Duration::from_millis(200));
        assert_eq!(stepper.state().year(), 2004);
    }
}
