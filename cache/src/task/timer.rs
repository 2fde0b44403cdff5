use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct TimerState {
  interval: Duration,
  armed: bool,
  stopped: bool,
  /// Bumped on every arm, disarm and reschedule so a waiting thread can
  /// tell its deadline is stale.
  generation: u64,
}

struct TimerInner {
  state: Mutex<TimerState>,
  condvar: Condvar,
}

/// A periodic background timer driving the expiration sweep.
///
/// While disarmed the thread parks on a condition variable and never wakes
/// on its own. Arming, disarming, rescheduling and stopping are safe from
/// any thread, including from inside the tick callback.
pub(crate) struct SweepTimer {
  inner: Arc<TimerInner>,
  _handle: JoinHandle<()>,
}

impl SweepTimer {
  /// Spawns the timer thread, initially disarmed.
  ///
  /// `tick` runs once per elapsed interval while armed, without the timer's
  /// lock held. Returning `false` ends the thread.
  pub(crate) fn spawn<F>(interval: Duration, mut tick: F) -> Self
  where
    F: FnMut() -> bool + Send + 'static,
  {
    let inner = Arc::new(TimerInner {
      state: Mutex::new(TimerState {
        interval,
        armed: false,
        stopped: false,
        generation: 0,
      }),
      condvar: Condvar::new(),
    });

    let thread_inner = inner.clone();
    let handle = thread::spawn(move || {
      let inner = thread_inner;
      let mut state = inner.state.lock();
      loop {
        if state.stopped {
          return;
        }
        if !state.armed {
          inner.condvar.wait(&mut state);
          continue;
        }

        let generation = state.generation;
        let deadline = Instant::now() + state.interval;
        if !Self::wait_for_deadline(&inner.condvar, &mut state, deadline, generation) {
          continue;
        }

        let keep_running = MutexGuard::unlocked(&mut state, &mut tick);
        if !keep_running {
          state.stopped = true;
          return;
        }
      }
    });

    Self {
      inner,
      _handle: handle,
    }
  }

  /// Waits until `deadline`. Returns `false` if the timer was changed in
  /// the meantime and the deadline no longer applies.
  fn wait_for_deadline(
    condvar: &Condvar,
    state: &mut MutexGuard<'_, TimerState>,
    deadline: Instant,
    generation: u64,
  ) -> bool {
    loop {
      let timed_out = condvar.wait_until(state, deadline).timed_out();
      if state.stopped || !state.armed || state.generation != generation {
        return false;
      }
      if timed_out || Instant::now() >= deadline {
        return true;
      }
    }
  }

  /// Starts ticking if the timer is disarmed. An armed timer keeps its
  /// current deadline.
  pub(crate) fn arm(&self) {
    let mut state = self.inner.state.lock();
    if !state.armed {
      state.armed = true;
      state.generation += 1;
      self.inner.condvar.notify_all();
    }
  }

  pub(crate) fn disarm(&self) {
    let mut state = self.inner.state.lock();
    if state.armed {
      state.armed = false;
      state.generation += 1;
      self.inner.condvar.notify_all();
    }
  }

  pub(crate) fn is_armed(&self) -> bool {
    self.inner.state.lock().armed
  }

  /// Changes the interval. An armed timer restarts its wait from now.
  pub(crate) fn reschedule(&self, interval: Duration) {
    let mut state = self.inner.state.lock();
    state.interval = interval;
    state.generation += 1;
    self.inner.condvar.notify_all();
  }

  /// Signals the timer thread to exit. Does not wait for it.
  pub(crate) fn stop(&self) {
    let mut state = self.inner.state.lock();
    state.stopped = true;
    self.inner.condvar.notify_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counting_timer(interval: Duration) -> (SweepTimer, Arc<AtomicUsize>) {
    let ticks = Arc::new(AtomicUsize::new(0));
    let timer = SweepTimer::spawn(interval, {
      let ticks = ticks.clone();
      move || {
        ticks.fetch_add(1, Ordering::SeqCst);
        true
      }
    });
    (timer, ticks)
  }

  #[test]
  fn disarmed_timer_never_ticks() {
    let (timer, ticks) = counting_timer(Duration::from_millis(5));
    thread::sleep(Duration::from_millis(60));
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
    assert!(!timer.is_armed());
    timer.stop();
  }

  #[test]
  fn armed_timer_ticks_until_disarmed() {
    let (timer, ticks) = counting_timer(Duration::from_millis(10));
    timer.arm();
    thread::sleep(Duration::from_millis(100));
    assert!(ticks.load(Ordering::SeqCst) >= 3);

    timer.disarm();
    thread::sleep(Duration::from_millis(20));
    let after_disarm = ticks.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(ticks.load(Ordering::SeqCst), after_disarm);
    timer.stop();
  }

  #[test]
  fn reschedule_applies_new_interval() {
    let (timer, ticks) = counting_timer(Duration::from_secs(60));
    timer.arm();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    timer.reschedule(Duration::from_millis(10));
    thread::sleep(Duration::from_millis(100));
    assert!(ticks.load(Ordering::SeqCst) >= 3);
    timer.stop();
  }

  #[test]
  fn returning_false_ends_the_thread() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let timer = SweepTimer::spawn(Duration::from_millis(5), {
      let ticks = ticks.clone();
      move || {
        ticks.fetch_add(1, Ordering::SeqCst);
        false
      }
    });
    timer.arm();
    thread::sleep(Duration::from_millis(60));
    assert_eq!(ticks.load(Ordering::SeqCst), 1);
  }
}
