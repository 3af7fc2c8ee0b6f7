mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{Gate, wait_until};
use spp_core::{PoolConfig, PoolError, QueuedWork, ThreadPool};

/// Простая единица работы для проверки пула
#[derive(Default)]
struct Probe {
    runs: AtomicUsize,
    abandons: AtomicUsize,
    gate: Option<Gate>,
    started: Option<Gate>,
    thread_name: Mutex<Option<String>>,
}

impl Probe {
    fn blocking(gate: Gate, started: Gate) -> Self {
        Self { gate: Some(gate), started: Some(started), ..Self::default() }
    }
}

impl QueuedWork for Probe {
    fn do_threaded_work(&self) {
        *self.thread_name.lock().unwrap() = std::thread::current().name().map(str::to_string);
        if let Some(started) = &self.started {
            started.open();
        }
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
    }

    fn abandon(&self) {
        self.abandons.fetch_add(1, Ordering::SeqCst);
    }
}

fn pool(threads: usize) -> ThreadPool {
    ThreadPool::new(PoolConfig { num_threads: threads, thread_name: "test-pool".into() })
        .expect("pool should start")
}

#[test]
fn test_work_runs_on_named_pool_thread() {
    let pool = pool(2);
    let probe = Arc::new(Probe::default());

    pool.add_queued_work(probe.clone()).unwrap();
    wait_until(Duration::from_secs(5), || probe.runs.load(Ordering::SeqCst) == 1);

    let name = probe.thread_name.lock().unwrap().clone().unwrap_or_default();
    assert!(name.starts_with("test-pool-"), "unexpected thread name {:?}", name);
    assert_eq!(pool.num_threads(), 2);
}

#[test]
fn test_each_item_runs_exactly_once() {
    let pool = pool(4);
    let probes: Vec<Arc<Probe>> = (0..64).map(|_| Arc::new(Probe::default())).collect();

    for p in &probes {
        pool.add_queued_work(p.clone()).unwrap();
    }
    pool.shutdown();

    for p in &probes {
        let total = p.runs.load(Ordering::SeqCst) + p.abandons.load(Ordering::SeqCst);
        assert_eq!(total, 1, "every item must be either run or abandoned once");
    }
}

#[test]
fn test_retract_only_while_queued() {
    let pool = pool(1);
    let gate = Gate::new();
    let started = Gate::new();
    let blocker = Arc::new(Probe::blocking(gate.clone(), started.clone()));
    let queued = Arc::new(Probe::default());

    pool.add_queued_work(blocker.clone()).unwrap();
    started.wait();
    pool.add_queued_work(queued.clone()).unwrap();

    let blocker_work: Arc<dyn QueuedWork> = blocker.clone();
    let queued_work: Arc<dyn QueuedWork> = queued.clone();

    assert!(!pool.is_queued(&blocker_work), "running work is no longer queued");
    assert!(pool.is_queued(&queued_work));
    assert!(!pool.retract_queued_work(&blocker_work));
    assert!(pool.retract_queued_work(&queued_work));
    assert!(!pool.retract_queued_work(&queued_work));
    assert_eq!(pool.num_queued(), 0);

    gate.open();
    wait_until(Duration::from_secs(5), || blocker.runs.load(Ordering::SeqCst) == 1);
    pool.shutdown();

    assert_eq!(queued.runs.load(Ordering::SeqCst), 0);
    assert_eq!(queued.abandons.load(Ordering::SeqCst), 0, "retract does not abandon");
}

#[test]
fn test_shutdown_abandons_queued_work() {
    let pool = pool(1);
    let gate = Gate::new();
    let started = Gate::new();
    let blocker = Arc::new(Probe::blocking(gate.clone(), started.clone()));
    let waiting: Vec<Arc<Probe>> = (0..3).map(|_| Arc::new(Probe::default())).collect();

    pool.add_queued_work(blocker.clone()).unwrap();
    started.wait();
    for p in &waiting {
        pool.add_queued_work(p.clone()).unwrap();
    }

    // открываем калитку из другого потока, пока shutdown ждет join
    let opener = {
        let gate = gate.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };
    pool.shutdown();
    opener.join().unwrap();

    assert_eq!(blocker.runs.load(Ordering::SeqCst), 1);
    for p in &waiting {
        assert_eq!(p.runs.load(Ordering::SeqCst), 0);
        assert_eq!(p.abandons.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_add_after_shutdown_is_abandoned() {
    let pool = pool(1);
    pool.shutdown();
    pool.shutdown();

    let probe = Arc::new(Probe::default());
    assert_eq!(pool.add_queued_work(probe.clone()), Err(PoolError::ShutDown));
    assert_eq!(probe.abandons.load(Ordering::SeqCst), 1);
    assert_eq!(probe.runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_zero_threads_is_clamped_to_one() {
    let pool = pool(0);
    assert_eq!(pool.num_threads(), 1);

    let probe = Arc::new(Probe::default());
    pool.add_queued_work(probe.clone()).unwrap();
    wait_until(Duration::from_secs(5), || probe.runs.load(Ordering::SeqCst) == 1);
}
