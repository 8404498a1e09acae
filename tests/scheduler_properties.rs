//! Property tests for the task scheduler against a simulated timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tm_timer::{Scheduler, SimulatedTimer, TaskContext, TaskHandle, TimerConfig};

fn counting_task(count: &Arc<AtomicU64>) -> impl FnMut(&mut TaskContext<'_>) + Send + 'static {
    let count = count.clone();
    move |_: &mut TaskContext<'_>| {
        count.fetch_add(1, Ordering::Relaxed);
    }
}

fn expected(ticks: u64, tick_divisor: u32, task_divisor: u32) -> u64 {
    ticks * u64::from(tick_divisor) / u64::from(task_divisor)
}

#[test]
fn invocation_counts_do_not_drift() {
    let config = TimerConfig::default();
    let mut scheduler = Scheduler::new(SimulatedTimer::new(), config);
    let fast = Arc::new(AtomicU64::new(0));
    let at_50 = Arc::new(AtomicU64::new(0));
    let at_137 = Arc::new(AtomicU64::new(0));
    scheduler.schedule(counting_task(&fast), 1000, 1).unwrap();
    scheduler.schedule(counting_task(&at_50), 50, 1).unwrap();
    scheduler.schedule(counting_task(&at_137), 137, 1).unwrap();
    scheduler.start();

    let tick_divisor = scheduler.divisor();
    assert_eq!(tick_divisor, config.divisor_for(1000));
    let ticks = 50_000u64;
    for _ in 0..ticks {
        scheduler.tick();
    }

    for (count, rate) in [(&fast, 1000), (&at_50, 50), (&at_137, 137)] {
        let want = expected(ticks, tick_divisor, config.divisor_for(rate));
        let got = count.load(Ordering::Relaxed);
        assert!(got.abs_diff(want) <= 1, "rate {rate}: got {got}, want {want}");
    }
}

#[test]
fn single_task_runs_every_tick() {
    for rate in [50, 137] {
        let mut scheduler = Scheduler::new(SimulatedTimer::new(), TimerConfig::default());
        let count = Arc::new(AtomicU64::new(0));
        scheduler.schedule(counting_task(&count), rate, 1).unwrap();
        scheduler.start();
        for _ in 0..10_000 {
            scheduler.tick();
        }
        assert_eq!(count.load(Ordering::Relaxed), 10_000);
    }
}

/// Small deterministic generator so the sequence is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn hardware_rate_tracks_fastest_active_task() {
    let config = TimerConfig::default();
    let mut scheduler = Scheduler::new(SimulatedTimer::new(), config);
    let mut rng = Lcg(7);
    let mut live: Vec<(TaskHandle, u32)> = Vec::new();

    for _ in 0..2_000 {
        match rng.next() % 4 {
            0 | 1 if live.len() < config.max_tasks => {
                let rate = 1 + (rng.next() % 2000) as u32;
                let handle = scheduler.schedule(|_: &mut TaskContext<'_>| {}, rate, 1 + (rng.next() % 5) as i32);
                live.push((handle.unwrap(), rate));
            }
            2 if !live.is_empty() => {
                let i = (rng.next() as usize) % live.len();
                let rate = 1 + (rng.next() % 2000) as u32;
                scheduler.set_rate(live[i].0, rate).unwrap();
                live[i].1 = rate;
            }
            _ if !live.is_empty() => {
                let i = (rng.next() as usize) % live.len();
                let (handle, _) = live.swap_remove(i);
                assert!(scheduler.terminate(handle).unwrap());
            }
            _ => {}
        }
        if scheduler.is_installed() {
            let want = live
                .iter()
                .map(|&(_, rate)| config.clamp_hardware(config.divisor_for(rate)))
                .min()
                .unwrap_or(config.idle_divisor);
            assert_eq!(scheduler.divisor(), want);
            assert_eq!(scheduler.hardware().divisor(), want);
        }
        if rng.next() % 8 == 0 {
            scheduler.tick();
        }
    }
}
