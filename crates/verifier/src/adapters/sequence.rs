// adapters/sequence.rs

//! Owner-thread task queue. Worker jobs never call completion callbacks
//! directly; they post them here and the owner runs them when it drives
//! the loop.

use tokio::sync::mpsc;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable, `Send` handle used to post work to the owner.
#[derive(Clone)]
pub struct OwnerSequence {
  tx: mpsc::UnboundedSender<Task>,
}

/// Receiving half; must stay on the owner thread.
pub struct OwnerLoop {
  rx: mpsc::UnboundedReceiver<Task>,
}

pub fn owner_sequence() -> (OwnerSequence, OwnerLoop) {
  let (tx, rx) = mpsc::unbounded_channel();
  (OwnerSequence { tx }, OwnerLoop { rx })
}

impl OwnerSequence {
  /// Queue `task`. Returns false if the loop is gone; the task is dropped.
  pub fn post(&self, task: Task) -> bool {
    self.tx.send(task).is_ok()
  }
}

impl OwnerLoop {
  /// Run every task already queued, without waiting. Returns how many ran.
  pub fn run_until_idle(&mut self) -> usize {
    let mut ran = 0;
    while let Ok(task) = self.rx.try_recv() {
      task();
      ran += 1;
    }
    ran
  }

  /// Wait for the next task and run it. Returns false once every
  /// `OwnerSequence` has been dropped and the queue is drained.
  pub async fn run_next(&mut self) -> bool {
    match self.rx.recv().await {
      Some(task) => {
        task();
        true
      }
      None => false,
    }
  }

  /// Blocking form of [`run_next`](Self::run_next) for threads outside an
  /// async context.
  pub fn blocking_run_next(&mut self) -> bool {
    match self.rx.blocking_recv() {
      Some(task) => {
        task();
        true
      }
      None => false,
    }
  }
}
