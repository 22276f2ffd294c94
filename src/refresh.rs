//! Client-side token refresh scheduler.
//!
//! Browser-facing consumers receive a short-lived bearer token together with its lifetime and
//! must swap in a fresh one before it expires. [`RefreshScheduler`] drives that from a single
//! tokio task with two timers:
//!
//! - the **refresh timer** fires once, `max(expires_in - 60s, 10s)` after the last token
//!   arrived, and is re-armed from every successful fetch;
//! - the **idle timer** ticks every `check_interval` and compares the wall clock against the
//!   previous tick. A gap larger than `check_interval + max_drift` means the host was
//!   suspended, so the pending refresh is dropped and one happens immediately.
//!
//! A failed fetch is logged and leaves the refresh timer disarmed; the idle timer remains the
//! only way back. Dropping or cancelling the [`RefreshHandle`] stops both timers.

pub mod source;

pub use source::*;

// crates.io
use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self as tokio_time, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	clock::{Clock, SystemClock},
	obs::{self, OpSpan, Operation, Outcome},
};

/// Refresh lead time before stated expiry.
pub const REFRESH_LEAD: Duration = Duration::seconds(60);
/// Lower bound on the refresh delay.
pub const MIN_REFRESH_DELAY: Duration = Duration::seconds(10);
/// Default idle-detection period.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::seconds(30);
/// Default tolerated lateness of an idle tick before a suspension is assumed.
pub const DEFAULT_MAX_DRIFT: Duration = Duration::seconds(60);

// Longest timer the task arms; later deadlines would overflow `Instant`.
const FAR_FUTURE: std::time::Duration = std::time::Duration::from_secs(86_400 * 365 * 30);

/// Delay before refreshing a token that lives for `expires_in`.
pub fn refresh_delay(expires_in: Duration) -> Duration {
	expires_in.saturating_sub(REFRESH_LEAD).max(MIN_REFRESH_DELAY)
}

fn deadline_after(delay: Duration) -> Instant {
	Instant::now() + delay.unsigned_abs().min(FAR_FUTURE)
}

/// Builder for the refresh task.
pub struct RefreshScheduler<S, F> {
	source: S,
	initial_expires_in: Duration,
	on_update: F,
	clock: Arc<dyn Clock>,
	check_interval: Duration,
	max_drift: Duration,
}
impl<S, F> RefreshScheduler<S, F>
where
	S: TokenSource,
	F: 'static + Send + FnMut(TokenSecret),
{
	/// Creates a scheduler for a token already in hand that lives for `initial_expires_in`.
	///
	/// `on_update` receives every newly fetched token.
	pub fn new(source: S, initial_expires_in: Duration, on_update: F) -> Self {
		Self {
			source,
			initial_expires_in,
			on_update,
			clock: Arc::new(SystemClock),
			check_interval: DEFAULT_CHECK_INTERVAL,
			max_drift: DEFAULT_MAX_DRIFT,
		}
	}

	/// Replaces the wall clock used for drift detection.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the idle-detection period; non-positive values keep the current one.
	pub fn with_check_interval(mut self, interval: Duration) -> Self {
		if interval.is_positive() {
			self.check_interval = interval;
		}

		self
	}

	/// Overrides the tolerated idle-tick lateness.
	pub fn with_max_drift(mut self, max_drift: Duration) -> Self {
		self.max_drift = max_drift.max(Duration::ZERO);

		self
	}

	/// Spawns the refresh task on the current tokio runtime.
	pub fn start(self) -> RefreshHandle {
		let (cancel, cancelled) = watch::channel(false);
		let task = tokio::spawn(self.run(cancelled));

		RefreshHandle { cancel, task }
	}

	async fn run(self, mut cancelled: watch::Receiver<bool>) {
		let Self { source, initial_expires_in, mut on_update, clock, check_interval, max_drift } =
			self;
		let period = check_interval.unsigned_abs().min(FAR_FUTURE);
		let drift_limit = check_interval.saturating_add(max_drift);
		let refresh_timer =
			tokio_time::sleep_until(deadline_after(refresh_delay(initial_expires_in)));
		let mut idle_timer = tokio_time::interval_at(Instant::now() + period, period);
		let mut armed = true;
		let mut last_checked = clock.now();

		tokio::pin!(refresh_timer);
		idle_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			let forced = tokio::select! {
				biased;
				_ = cancelled.changed() => break,
				_ = &mut refresh_timer, if armed => {
					armed = false;

					false
				},
				_ = idle_timer.tick() => {
					let now = clock.now();
					let drift = now - last_checked;

					last_checked = now;

					if drift <= check_interval + max_drift {
						continue;
					}

					tracing::warn!(
						drift_ms = drift.whole_milliseconds() as i64,
						"detected a long pause, forcing an early token refresh"
					);
					armed = false;

					true
				},
			};
			let stage = if forced { "forced" } else { "scheduled" };
			let span = OpSpan::new(Operation::ClientRefresh, stage);

			obs::record_outcome(Operation::ClientRefresh, Outcome::Attempt);

			let result = tokio::select! {
				biased;
				_ = cancelled.changed() => break,
				result = span.instrument(source.request_token()) => result,
			};

			match result {
				Ok(token) => {
					let delay = refresh_delay(token.expires_in);

					tracing::debug!(
						expires_in = token.expires_in.whole_seconds(),
						"client token refreshed"
					);
					obs::record_outcome(Operation::ClientRefresh, Outcome::Success);
					on_update(token.token);
					last_checked = clock.now();
					refresh_timer.as_mut().reset(deadline_after(delay));
					armed = true;
				},
				Err(err) => {
					tracing::error!(error = %err, "failed to refresh client token");
					obs::record_outcome(Operation::ClientRefresh, Outcome::Failure);
				},
			}
		}
	}
}
impl<S, F> Debug for RefreshScheduler<S, F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshScheduler")
			.field("initial_expires_in", &self.initial_expires_in)
			.field("check_interval", &self.check_interval)
			.field("max_drift", &self.max_drift)
			.finish()
	}
}

/// Handle to a running [`RefreshScheduler`] task.
///
/// Cancelling or dropping the handle stops both timers; a fetch still in flight is abandoned
/// and its result never reaches the update callback.
#[derive(Debug)]
pub struct RefreshHandle {
	cancel: watch::Sender<bool>,
	task: JoinHandle<()>,
}
impl RefreshHandle {
	/// Stops the scheduler.
	pub fn cancel(self) {
		let _ = self.cancel.send(true);
	}

	/// Returns `true` once the task has exited.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}
}
impl Drop for RefreshHandle {
	fn drop(&mut self) {
		let _ = self.cancel.send(true);
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{clock::ManualClock, error::AuthGrantError};

	#[derive(Clone, Default)]
	struct FakeSource {
		calls: Arc<AtomicUsize>,
		fail: bool,
		latency: std::time::Duration,
		lifetime: Option<Duration>,
	}
	impl TokenSource for FakeSource {
		fn request_token(&self) -> TokenFuture<'_> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

				tokio_time::sleep(self.latency).await;

				if self.fail {
					return Err(AuthGrantError::MissingAccessToken.into());
				}

				Ok(ClientToken {
					token: TokenSecret::new(format!("token-{call}")),
					expires_in: self.lifetime.unwrap_or(Duration::seconds(120)),
				})
			})
		}
	}

	fn recorder() -> (Arc<Mutex<Vec<String>>>, impl 'static + Send + FnMut(TokenSecret)) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();

		(seen, move |token: TokenSecret| sink.lock().push(token.expose().to_owned()))
	}

	fn manual_clock() -> ManualClock {
		ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC))
	}

	async fn sleep_secs(secs: u64) {
		tokio_time::sleep(std::time::Duration::from_secs(secs)).await;
	}

	#[test]
	fn refresh_delay_leads_expiry_with_a_floor() {
		assert_eq!(refresh_delay(Duration::seconds(3600)), Duration::seconds(3540));
		assert_eq!(refresh_delay(Duration::seconds(120)), Duration::seconds(60));
		assert_eq!(refresh_delay(Duration::seconds(65)), Duration::seconds(10));
		assert_eq!(refresh_delay(Duration::ZERO), Duration::seconds(10));
		assert_eq!(refresh_delay(Duration::MIN), Duration::seconds(10));
		assert_eq!(refresh_delay(Duration::MAX), Duration::MAX - Duration::seconds(60));
	}

	#[tokio::test(start_paused = true)]
	async fn refreshes_once_when_the_timer_fires() {
		let source = FakeSource::default();
		let calls = source.calls.clone();
		let (seen, on_update) = recorder();
		let handle = RefreshScheduler::new(source, Duration::seconds(120), on_update)
			.with_clock(Arc::new(manual_clock()))
			.start();

		sleep_secs(59).await;

		assert_eq!(calls.load(Ordering::SeqCst), 0);

		sleep_secs(2).await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(*seen.lock(), vec!["token-1".to_owned()]);

		// Re-armed from the new 120s lifetime.
		sleep_secs(60).await;

		assert_eq!(calls.load(Ordering::SeqCst), 2);

		handle.cancel();
	}

	#[tokio::test(start_paused = true)]
	async fn long_pause_forces_an_early_refresh() {
		let clock = manual_clock();
		let source = FakeSource::default();
		let calls = source.calls.clone();
		let (seen, on_update) = recorder();
		let _handle = RefreshScheduler::new(source, Duration::seconds(3600), on_update)
			.with_clock(Arc::new(clock.clone()))
			.start();

		clock.advance(Duration::seconds(30));
		sleep_secs(31).await;

		assert_eq!(calls.load(Ordering::SeqCst), 0, "regular ticks should not refresh");

		clock.advance(Duration::seconds(120));
		sleep_secs(30).await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(seen.lock().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_refresh_is_not_rescheduled() {
		let source = FakeSource { fail: true, ..Default::default() };
		let calls = source.calls.clone();
		let (seen, on_update) = recorder();
		let handle = RefreshScheduler::new(source, Duration::seconds(70), on_update)
			.with_clock(Arc::new(manual_clock()))
			.start();

		sleep_secs(11).await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);

		sleep_secs(600).await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(seen.lock().is_empty());
		assert!(!handle.is_finished());
	}

	#[tokio::test(start_paused = true)]
	async fn cancellation_stops_timers_and_discards_in_flight_results() {
		let source =
			FakeSource { latency: std::time::Duration::from_secs(10), ..Default::default() };
		let calls = source.calls.clone();
		let (seen, on_update) = recorder();
		let clock = manual_clock();
		let handle = RefreshScheduler::new(source, Duration::seconds(70), on_update)
			.with_clock(Arc::new(clock.clone()))
			.start();

		// Fetch starts at 10s and would complete at 20s.
		sleep_secs(15).await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);

		handle.cancel();
		clock.advance(Duration::hours(1));
		sleep_secs(600).await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(seen.lock().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn huge_lifetimes_arm_distant_timers_without_overflow() {
		let source = FakeSource { lifetime: Some(Duration::MAX), ..Default::default() };
		let calls = source.calls.clone();
		let (seen, on_update) = recorder();
		let handle = RefreshScheduler::new(source, Duration::seconds(70), on_update)
			.with_clock(Arc::new(manual_clock()))
			.with_max_drift(Duration::MAX)
			.start();

		sleep_secs(11).await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(seen.lock().len(), 1);

		sleep_secs(3600).await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(!handle.is_finished(), "the refresh task should still be running");

		let idle = RefreshScheduler::new(FakeSource::default(), Duration::MAX, |_: TokenSecret| {})
			.with_check_interval(Duration::MAX)
			.start();

		sleep_secs(60).await;

		assert!(!idle.is_finished(), "the refresh task should still be running");
	}

	#[tokio::test(start_paused = true)]
	async fn dropping_the_handle_cancels() {
		let source = FakeSource::default();
		let calls = source.calls.clone();
		let (_seen, on_update) = recorder();
		let handle = RefreshScheduler::new(source, Duration::seconds(70), on_update)
			.with_clock(Arc::new(manual_clock()))
			.start();

		drop(handle);
		sleep_secs(120).await;

		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}
}
