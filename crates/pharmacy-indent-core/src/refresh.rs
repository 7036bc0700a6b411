//! Refetch coordination for views backed by the store.
//!
//! [`RefetchCoalescer`] turns a burst of change notifications into at most
//! one refetch per window, with a trailing refetch for anything that arrived
//! inside the window. [`ViewData`] tags each refetch with a generation so a
//! slow, superseded response cannot overwrite a newer one. [`LiveView`]
//! puts both behind a lock so store change callbacks and refetching callers
//! can share one view.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Rate limiter for change-triggered refetches.
#[derive(Debug, Clone)]
pub struct RefetchCoalescer {
    window: Duration,
    last_fire: Option<Instant>,
    pending: bool,
}

impl RefetchCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fire: None,
            pending: false,
        }
    }

    /// Record a change. Returns true if a refetch should start now.
    pub fn notify(&mut self, now: Instant) -> bool {
        if self.window_open(now) {
            self.fire(now);
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// Returns true if a deferred refetch is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.pending && self.window_open(now) {
            self.fire(now);
            true
        } else {
            false
        }
    }

    /// When the deferred refetch becomes due, if one is waiting.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.pending {
            return None;
        }
        self.last_fire.map(|t| t + self.window)
    }

    fn window_open(&self, now: Instant) -> bool {
        match self.last_fire {
            None => true,
            Some(last) => now >= last + self.window,
        }
    }

    fn fire(&mut self, now: Instant) {
        self.last_fire = Some(now);
        self.pending = false;
    }
}

/// Freshness of a view's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Stale,
    Refetching(u64),
    Fresh,
}

/// Identifies one refetch; only the latest one may apply its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct RefetchToken(u64);

/// What happened to a completed refetch.
#[derive(Debug, PartialEq)]
pub enum Completion<E> {
    Applied,
    /// A newer refetch started; the result was dropped
    Superseded,
    Failed(E),
}

/// Data for one view plus its refetch bookkeeping.
#[derive(Debug, Clone)]
pub struct ViewData<T> {
    data: Option<T>,
    state: ViewState,
    generation: u64,
}

impl<T> Default for ViewData<T> {
    fn default() -> Self {
        Self {
            data: None,
            state: ViewState::Stale,
            generation: 0,
        }
    }
}

impl<T> ViewData<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Mark the data as outdated, keeping it on screen.
    pub fn invalidate(&mut self) {
        if self.state == ViewState::Fresh {
            self.state = ViewState::Stale;
        }
    }

    /// Start a refetch, superseding any in flight.
    pub fn begin_refetch(&mut self) -> RefetchToken {
        self.generation += 1;
        self.state = ViewState::Refetching(self.generation);
        RefetchToken(self.generation)
    }

    /// Apply a refetch result if it belongs to the latest refetch.
    pub fn complete<E>(&mut self, token: RefetchToken, result: Result<T, E>) -> Completion<E> {
        if token.0 != self.generation {
            tracing::debug!(
                generation = token.0,
                latest = self.generation,
                "dropping superseded refetch"
            );
            return Completion::Superseded;
        }
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.state = ViewState::Fresh;
                Completion::Applied
            }
            Err(e) => {
                self.state = ViewState::Stale;
                Completion::Failed(e)
            }
        }
    }
}

/// A view kept current by store change notifications.
///
/// [`LiveView::on_change`] is called from a change subscription. Callers
/// check [`LiveView::take_due`] and run [`LiveView::refresh`]; the fetch runs
/// without the lock held, so a refresh started later supersedes one still in
/// flight.
#[derive(Debug)]
pub struct LiveView<T> {
    state: Mutex<LiveState<T>>,
}

#[derive(Debug)]
struct LiveState<T> {
    coalescer: RefetchCoalescer,
    view: ViewData<T>,
    due: bool,
}

impl<T> LiveView<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            state: Mutex::new(LiveState {
                coalescer: RefetchCoalescer::new(window),
                view: ViewData::new(),
                due: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LiveState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a store change. Returns how long until a refresh is due.
    pub fn on_change(&self, now: Instant) -> Duration {
        let mut state = self.lock();
        state.view.invalidate();
        if state.coalescer.notify(now) {
            state.due = true;
            return Duration::ZERO;
        }
        state
            .coalescer
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Whether a refresh should run now. Consumes the pending change.
    ///
    /// A view that never loaded is always due.
    pub fn take_due(&self, now: Instant) -> bool {
        let mut state = self.lock();
        let trailing = state.coalescer.poll(now);
        let due = state.due || trailing || state.view.data().is_none();
        state.due = false;
        due
    }

    /// Time left until a deferred refresh is due, if one is waiting.
    pub fn due_in(&self, now: Instant) -> Option<Duration> {
        let state = self.lock();
        if state.due {
            return Some(Duration::ZERO);
        }
        state
            .coalescer
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Run `fetch` under a new generation and apply its result if still latest.
    pub fn refresh<E>(&self, fetch: impl FnOnce() -> Result<T, E>) -> Completion<E> {
        let token = self.lock().view.begin_refetch();
        let result = fetch();
        self.lock().view.complete(token, result)
    }

    pub fn state(&self) -> ViewState {
        self.lock().view.state()
    }

    /// Read the current data, if any.
    pub fn with_data<R>(&self, read: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().view.data().map(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalescer_limits_to_one_per_window() {
        let mut c = RefetchCoalescer::new(Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(c.notify(t0));
        assert!(!c.notify(t0 + Duration::from_millis(100)));
        assert!(!c.notify(t0 + Duration::from_millis(900)));
        assert_eq!(c.next_deadline(), Some(t0 + Duration::from_secs(1)));

        assert!(!c.poll(t0 + Duration::from_millis(999)));
        assert!(c.poll(t0 + Duration::from_secs(1)));
        // trailing fire consumed
        assert!(!c.poll(t0 + Duration::from_secs(5)));
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn test_coalescer_fires_immediately_after_quiet_period() {
        let mut c = RefetchCoalescer::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        assert!(c.notify(t0));
        assert!(c.notify(t0 + Duration::from_millis(1500)));
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let mut view: ViewData<Vec<&str>> = ViewData::new();
        let slow = view.begin_refetch();
        let fast = view.begin_refetch();

        assert_eq!(
            view.complete::<()>(fast, Ok(vec!["new"])),
            Completion::Applied
        );
        assert_eq!(
            view.complete::<()>(slow, Ok(vec!["old"])),
            Completion::Superseded
        );
        assert_eq!(view.data(), Some(&vec!["new"]));
        assert_eq!(view.state(), ViewState::Fresh);
    }

    #[test]
    fn test_failed_refetch_keeps_previous_data() {
        let mut view = ViewData::new();
        let t = view.begin_refetch();
        assert_eq!(view.complete::<&str>(t, Ok(1)), Completion::Applied);

        view.invalidate();
        assert_eq!(view.state(), ViewState::Stale);
        let t = view.begin_refetch();
        assert_eq!(view.state(), ViewState::Refetching(2));
        assert_eq!(view.complete(t, Err("offline")), Completion::Failed("offline"));
        assert_eq!(view.data(), Some(&1));
        assert_eq!(view.state(), ViewState::Stale);
    }

    #[test]
    fn test_live_view_first_load_then_changes() {
        let live = LiveView::new(Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(live.take_due(t0));
        assert_eq!(live.refresh::<()>(|| Ok(1)), Completion::Applied);
        assert!(!live.take_due(t0));
        assert_eq!(live.due_in(t0), None);

        assert_eq!(live.on_change(t0), Duration::ZERO);
        assert_eq!(live.state(), ViewState::Stale);
        assert!(live.take_due(t0));
        assert_eq!(live.refresh::<()>(|| Ok(2)), Completion::Applied);

        // burst inside the window collapses into one trailing refresh
        let t1 = t0 + Duration::from_millis(300);
        assert_eq!(live.on_change(t1), Duration::from_millis(700));
        live.on_change(t1 + Duration::from_millis(100));
        assert!(!live.take_due(t1 + Duration::from_millis(200)));
        assert_eq!(
            live.due_in(t1 + Duration::from_millis(200)),
            Some(Duration::from_millis(500))
        );
        assert!(live.take_due(t0 + Duration::from_secs(1)));
        assert!(!live.take_due(t0 + Duration::from_secs(1)));
        assert_eq!(live.with_data(|d| *d), Some(2));
    }

    #[test]
    fn test_live_view_later_refresh_wins() {
        let live = LiveView::new(Duration::ZERO);
        let outer = live.refresh::<()>(|| {
            // a newer refresh starts and finishes while this one is in flight
            assert_eq!(live.refresh::<()>(|| Ok("new")), Completion::Applied);
            Ok("old")
        });
        assert_eq!(outer, Completion::Superseded);
        assert_eq!(live.with_data(|d| *d), Some("new"));
        assert_eq!(live.state(), ViewState::Fresh);
    }
}
