use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::error::PoolError;

/// Единица работы для пула.
pub trait QueuedWork: Send + Sync {
    /// Вызывается потоком пула. Не больше одного раза на единицу работы.
    fn do_threaded_work(&self);

    /// Вызывается, если работа выброшена из очереди, не успев начаться.
    fn abandon(&self);
}

/// Настройки пула потоков.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub num_threads: usize,
    /// Префикс имени потоков, к нему добавляется номер.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let num_threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            num_threads,
            thread_name: "spp-worker".to_string(),
        }
    }
}

struct Queue {
    items: VecDeque<Arc<dyn QueuedWork>>,
    shutting_down: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// Пул фиксированного размера с общей FIFO-очередью.
///
/// Элемент очереди забирает ровно один поток, поэтому работа выполняется не
/// больше одного раза. Пока элемент в очереди, его можно отозвать.
pub struct ThreadPool {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl ThreadPool {
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let num_threads = config.num_threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                items: VecDeque::new(),
                shutting_down: false,
            }),
            available: Condvar::new(),
        });

        let mut threads = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let thread_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, i))
                .spawn(move || run(thread_shared))
                .map_err(|e| PoolError::Spawn(e.to_string()));

            match handle {
                Ok(h) => threads.push(h),
                Err(e) => {
                    // уже запущенные потоки надо остановить, иначе они повиснут на condvar
                    let pool = Self { shared, threads: Mutex::new(threads), num_threads: i };
                    pool.shutdown();
                    return Err(e);
                }
            }
        }

        debug!(num_threads, "thread pool started");

        Ok(Self {
            shared,
            threads: Mutex::new(threads),
            num_threads,
        })
    }

    /// Ставит работу в очередь.
    ///
    /// # Errors
    ///
    /// `PoolError::ShutDown`, если пул уже остановлен. Работа в этом случае
    /// сразу получает `abandon()`.
    pub fn add_queued_work(&self, work: Arc<dyn QueuedWork>) -> Result<(), PoolError> {
        {
            let mut queue = self.shared.queue.lock();
            if !queue.shutting_down {
                queue.items.push_back(work);
                self.shared.available.notify_one();
                return Ok(());
            }
        }
        work.abandon();
        Err(PoolError::ShutDown)
    }

    /// Убирает работу из очереди, если ни один поток ее еще не забрал.
    ///
    /// `abandon()` здесь не вызывается, это дело того, кто отзывает.
    pub fn retract_queued_work(&self, work: &Arc<dyn QueuedWork>) -> bool {
        let mut queue = self.shared.queue.lock();
        match queue.items.iter().position(|w| same_work(w, work)) {
            Some(pos) => {
                queue.items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// `true`, пока работа лежит в очереди и ни один поток ее не забрал.
    pub fn is_queued(&self, work: &Arc<dyn QueuedWork>) -> bool {
        self.shared.queue.lock().items.iter().any(|w| same_work(w, work))
    }

    pub fn num_queued(&self) -> usize {
        self.shared.queue.lock().items.len()
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Останавливает пул: новая работа не принимается, все из очереди получает
    /// `abandon()`, потоки дожидаются завершения текущей работы. Повторный вызов безопасен.
    pub fn shutdown(&self) {
        let drained: Vec<Arc<dyn QueuedWork>> = {
            let mut queue = self.shared.queue.lock();
            queue.shutting_down = true;
            queue.items.drain(..).collect()
        };
        self.shared.available.notify_all();

        if !drained.is_empty() {
            debug!(count = drained.len(), "abandoning queued work");
        }
        for work in drained {
            work.abandon();
        }

        let threads: Vec<JoinHandle<()>> = self.threads.lock().drain(..).collect();
        for handle in threads {
            if handle.join().is_err() {
                error!("pool thread terminated with a panic");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: Arc<Shared>) {
    loop {
        let work = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(work) = queue.items.pop_front() {
                    break Some(work);
                }
                if queue.shutting_down {
                    break None;
                }
                shared.available.wait(&mut queue);
            }
        };

        let Some(work) = work else {
            trace!("pool thread exiting");
            return;
        };

        if panic::catch_unwind(AssertUnwindSafe(|| work.do_threaded_work())).is_err() {
            error!("queued work panicked");
        }
    }
}

// сравниваем только адрес данных: vtable у одного и того же объекта может отличаться
fn same_work(a: &Arc<dyn QueuedWork>, b: &Arc<dyn QueuedWork>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
