#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use spp_core::storage::{self, StateStore};
use spp_core::{
    ItemPath, ItemState, Operation, Provider, StateEntry, StateTable, Worker, WorkerError,
};

/// Калитка, на которой воркер ждет, пока тест ее не откроет
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
    }
}

/// Поддельный воркер: ничего не запускает, просто сообщает заранее заданные состояния
pub struct FakeWorker {
    pub report: Vec<(ItemPath, ItemState)>,
    pub fail: bool,
    pub panic: bool,
    pub gate: Option<Gate>,
    pub started: Option<Gate>,
    pub executions: Arc<AtomicUsize>,
    found: Vec<(ItemPath, ItemState)>,
}

impl FakeWorker {
    pub fn reporting(report: &[(&str, ItemState)]) -> Self {
        Self {
            report: report.iter().map(|(p, s)| (ItemPath::from(*p), *s)).collect(),
            fail: false,
            panic: false,
            gate: None,
            started: None,
            executions: Arc::new(AtomicUsize::new(0)),
            found: Vec::new(),
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::reporting(&[]) }
    }

    pub fn panicking() -> Self {
        Self { panic: true, ..Self::reporting(&[]) }
    }

    pub fn gated(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Открывает `started` в момент начала выполнения
    pub fn signalling(mut self, started: Gate) -> Self {
        self.started = Some(started);
        self
    }

    pub fn counting(mut self, executions: Arc<AtomicUsize>) -> Self {
        self.executions = executions;
        self
    }
}

impl Worker for FakeWorker {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(started) = &self.started {
            started.open();
        }
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if self.panic {
            panic!("fake worker blew up");
        }
        if self.fail {
            return Err(WorkerError::ToolFailed {
                command: format!("fake {}", operation.name()),
                code: Some(1),
                stderr: "boom".to_string(),
            });
        }
        self.found = self.report.clone();
        Ok(())
    }

    fn update_states(&mut self, states: &mut StateTable) -> bool {
        states.merge_all(self.found.drain(..))
    }
}

/// Хранилище в памяти
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub entries: Arc<Mutex<Vec<StateEntry>>>,
}

impl StateStore for MemoryStore {
    fn load(&self) -> storage::Result<Vec<StateEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    fn save(&mut self, entries: &[StateEntry]) -> storage::Result<()> {
        *self.entries.lock().unwrap() = entries.to_vec();
        Ok(())
    }
}

pub fn paths(items: &[&str]) -> Vec<ItemPath> {
    items.iter().map(|p| ItemPath::from(*p)).collect()
}

/// Крутит `tick`, пока провайдер не освободится. Паникует по таймауту.
pub fn drive_until_idle(provider: &mut Provider, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut states_changed = false;
    while !provider.is_idle() {
        assert!(Instant::now() < deadline, "provider did not become idle in {:?}", timeout);
        states_changed |= provider.tick().states_changed;
        thread::sleep(Duration::from_millis(5));
    }
    states_changed
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in {:?}", timeout);
        thread::sleep(Duration::from_millis(2));
    }
}
