//! Daily run scheduling
//!
//! The scheduler is armed once at startup for `tomorrow + scheduled_hour`.
//! After every timer-triggered run, successful or not, it re-arms for exactly
//! 24 hours after completion. A late run therefore shifts every following
//! run by the same amount.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::pipeline::RunSummary;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Work executed on every tick
#[async_trait]
pub trait Job: Send + Sync {
    /// Perform one run
    ///
    /// # Errors
    /// Returns `PipelineError` if the run was abandoned
    async fn run(&self) -> Result<RunSummary, PipelineError>;
}

/// Delay between the end of one run and the next
#[must_use]
pub fn run_interval() -> TimeDelta {
    TimeDelta::hours(24)
}

/// When the timer fires next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    next_fire_time: NaiveDateTime,
}

impl ScheduleState {
    /// Midnight of `now`'s day, plus one day, plus `scheduled_hour` hours
    ///
    /// A time beyond the calendar's range saturates to `NaiveDateTime::MAX`.
    #[must_use]
    pub fn initial(now: NaiveDateTime, scheduled_hour: f64) -> Self {
        let midnight = now.date().and_time(NaiveTime::MIN);
        #[allow(clippy::cast_possible_truncation)]
        let offset = TimeDelta::try_milliseconds((scheduled_hour * 3_600_000.0).round() as i64);

        let next_fire_time = offset
            .and_then(|offset| {
                midnight
                    .checked_add_signed(TimeDelta::days(1))?
                    .checked_add_signed(offset)
            })
            .unwrap_or(NaiveDateTime::MAX);

        Self { next_fire_time }
    }

    /// Next fire time
    #[must_use]
    pub fn next_fire_time(&self) -> NaiveDateTime {
        self.next_fire_time
    }

    /// Re-arm for one interval after `completed_at`
    pub fn rearm(&mut self, completed_at: NaiveDateTime) {
        self.next_fire_time = completed_at
            .checked_add_signed(run_interval())
            .unwrap_or(NaiveDateTime::MAX);
    }

    /// Time left until the next fire, zero if already due
    #[must_use]
    pub fn delay_from(&self, now: NaiveDateTime) -> Duration {
        (self.next_fire_time - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Runs a job immediately and then once per armed tick
pub struct Scheduler {
    job: Arc<dyn Job>,
    clock: Arc<dyn Clock>,
    state: ScheduleState,
}

impl Scheduler {
    /// Arm the scheduler for the first daily run
    pub fn arm(job: Arc<dyn Job>, clock: Arc<dyn Clock>, scheduled_hour: f64) -> Self {
        let state = ScheduleState::initial(clock.now(), scheduled_hour);
        info!(next_run = %state.next_fire_time(), "scheduler armed");
        Self { job, clock, state }
    }

    /// Next fire time
    #[must_use]
    pub fn next_fire_time(&self) -> NaiveDateTime {
        self.state.next_fire_time()
    }

    /// Execute the job once without touching the schedule
    ///
    /// Returns whether the run succeeded.
    pub async fn run_now(&self) -> bool {
        self.execute().await
    }

    /// Execute the job and re-arm for 24 hours after it finished
    ///
    /// Returns whether the run succeeded.
    pub async fn fire(&mut self) -> bool {
        let succeeded = self.execute().await;
        self.state.rearm(self.clock.now());
        info!(next_run = %self.state.next_fire_time(), "scheduler re-armed");
        succeeded
    }

    /// Run immediately, then on every tick, forever
    pub async fn run(mut self) {
        self.run_now().await;

        loop {
            let delay = self.state.delay_from(self.clock.now());
            debug!(delay = ?delay, "waiting for next run");
            tokio::time::sleep(delay).await;
            self.fire().await;
        }
    }

    /// The single catch boundary of a run
    ///
    /// The job runs on its own task so that a panic is reported like any
    /// other failure instead of taking the scheduler down.
    async fn execute(&self) -> bool {
        let job = Arc::clone(&self.job);
        let outcome = tokio::spawn(async move { job.run().await })
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))
            .and_then(|result| result);

        match outcome {
            Ok(summary) => {
                info!(
                    path = %summary.path.display(),
                    sections = summary.sections,
                    entries = summary.entries,
                    "inventory run finished, see you tomorrow"
                );
                true
            }
            Err(err) => {
                error!(error = %err, details = ?err, "inventory run failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;

    use super::*;
    use crate::error::MountError;

    struct ManualClock(Mutex<NaiveDateTime>);

    impl ManualClock {
        fn new(now: NaiveDateTime) -> Self {
            Self(Mutex::new(now))
        }

        fn set(&self, now: NaiveDateTime) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.0.lock().unwrap()
        }
    }

    /// Wall clock following tokio's (pausable) time
    struct TokioClock {
        origin: NaiveDateTime,
        started: tokio::time::Instant,
    }

    impl TokioClock {
        fn new(origin: NaiveDateTime) -> Self {
            Self {
                origin,
                started: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> NaiveDateTime {
            self.origin + TimeDelta::from_std(self.started.elapsed()).unwrap()
        }
    }

    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    impl CountingJob {
        fn new(fail: bool) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                fail,
            }
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn run(&self) -> Result<RunSummary, PipelineError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::Mount(MountError::Failed {
                    share: r"\\nas\apps".to_string(),
                    mount_point: "Z:".to_string(),
                    status: 2,
                }));
            }
            Ok(RunSummary {
                path: PathBuf::from(r"Z:\AppsList_2026-10-16.txt"),
                sections: 2,
                entries: 0,
            })
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl Job for PanickingJob {
        async fn run(&self) -> Result<RunSummary, PipelineError> {
            panic!("registry exploded");
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_initial_fire_is_tomorrow_at_scheduled_hour() {
        let state = ScheduleState::initial(at(16, 10, 0), 2.5);
        assert_eq!(state.next_fire_time(), at(17, 2, 30));
    }

    #[test]
    fn test_initial_fire_rolls_past_midnight() {
        let state = ScheduleState::initial(at(16, 10, 0), 26.0);
        assert_eq!(state.next_fire_time(), at(18, 2, 0));
    }

    #[test]
    fn test_out_of_range_hours_saturate() {
        let now = at(16, 10, 0);

        assert_eq!(
            ScheduleState::initial(now, 1e12).next_fire_time(),
            NaiveDateTime::MAX
        );
        assert_eq!(
            ScheduleState::initial(now, f64::MAX).next_fire_time(),
            NaiveDateTime::MAX
        );

        let mut state = ScheduleState::initial(now, 2.0);
        state.rearm(NaiveDateTime::MAX);
        assert_eq!(state.next_fire_time(), NaiveDateTime::MAX);
    }

    #[test]
    fn test_initial_fire_is_in_the_future() {
        for minute_of_day in (0..24 * 60).step_by(7) {
            let now = at(16, minute_of_day / 60, minute_of_day % 60);
            for quarter in 0..96 {
                let hour = f64::from(quarter) / 4.0;
                let next = ScheduleState::initial(now, hour).next_fire_time();

                assert!(next > now);
                // Within 24h whenever today's slot has already passed
                if f64::from(minute_of_day) / 60.0 >= hour {
                    assert!(next - now <= run_interval());
                }
            }
        }
    }

    #[test]
    fn test_rearm_is_24h_after_completion() {
        let mut state = ScheduleState::initial(at(16, 10, 0), 2.0);
        state.rearm(at(17, 2, 47));
        assert_eq!(state.next_fire_time(), at(18, 2, 47));
    }

    #[test]
    fn test_delay_never_negative() {
        let state = ScheduleState::initial(at(16, 10, 0), 2.0);
        assert_eq!(state.delay_from(at(20, 0, 0)), Duration::ZERO);
        assert_eq!(
            state.delay_from(at(17, 1, 0)),
            Duration::from_secs(60 * 60)
        );
    }

    #[tokio::test]
    async fn test_fire_rearms_after_success_and_failure() {
        for fail in [false, true] {
            let clock = Arc::new(ManualClock::new(at(16, 10, 0)));
            let job = Arc::new(CountingJob::new(fail));
            let mut scheduler = Scheduler::arm(job.clone(), clock.clone(), 2.0);
            assert_eq!(scheduler.next_fire_time(), at(17, 2, 0));

            clock.set(at(17, 2, 5));
            assert_eq!(scheduler.fire().await, !fail);

            assert_eq!(job.runs(), 1);
            assert_eq!(scheduler.next_fire_time(), at(18, 2, 5));
        }
    }

    #[tokio::test]
    async fn test_run_now_keeps_schedule() {
        let clock = Arc::new(ManualClock::new(at(16, 10, 0)));
        let job = Arc::new(CountingJob::new(false));
        let scheduler = Scheduler::arm(job.clone(), clock, 2.0);

        assert!(scheduler.run_now().await);
        assert_eq!(job.runs(), 1);
        assert_eq!(scheduler.next_fire_time(), at(17, 2, 0));
    }

    #[tokio::test]
    async fn test_panicking_job_is_contained() {
        let clock = Arc::new(ManualClock::new(at(16, 10, 0)));
        let mut scheduler = Scheduler::arm(Arc::new(PanickingJob), clock.clone(), 2.0);

        clock.set(at(17, 2, 0));
        assert!(!scheduler.fire().await);
        assert_eq!(scheduler.next_fire_time(), at(18, 2, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fires_immediately_then_daily() {
        let clock = Arc::new(TokioClock::new(at(16, 10, 0)));
        let job = Arc::new(CountingJob::new(true));
        let scheduler = Scheduler::arm(job.clone(), clock, 2.0);

        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(job.runs(), 1);

        // First tick is tomorrow 02:00, 16h after start
        tokio::time::sleep(Duration::from_secs(16 * 60 * 60)).await;
        assert_eq!(job.runs(), 2);

        // Failed runs still re-arm 24h later
        tokio::time::sleep(Duration::from_secs(23 * 60 * 60)).await;
        assert_eq!(job.runs(), 2);
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(job.runs(), 3);

        handle.abort();
    }
}
