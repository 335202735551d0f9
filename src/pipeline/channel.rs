use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::types::FrameResult;

/// Producer half. Never blocks: a full channel loses its oldest entry.
///
/// It keeps a receiver of its own for eviction, so the channel never reports
/// a disconnect; dropping the sender raises `closed` instead.
pub struct ResultSender {
    tx: Sender<FrameResult>,
    evict: Receiver<FrameResult>,
    closed: Arc<AtomicBool>,
}

/// Consumer half.
#[derive(Clone)]
pub struct ResultReceiver {
    rx: Receiver<FrameResult>,
    closed: Arc<AtomicBool>,
}

pub fn result_channel(depth: usize) -> (ResultSender, ResultReceiver) {
    let (tx, rx) = bounded(depth.max(1));
    let closed = Arc::new(AtomicBool::new(false));
    (
        ResultSender {
            tx,
            evict: rx.clone(),
            closed: closed.clone(),
        },
        ResultReceiver { rx, closed },
    )
}

impl ResultSender {
    pub fn publish(&self, result: FrameResult) {
        let mut pending = result;
        while let Err(TrySendError::Full(back)) = self.tx.try_send(pending) {
            let _ = self.evict.try_recv();
            pending = back;
        }
    }
}

impl Drop for ResultSender {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl ResultReceiver {
    /// Drains everything pending and keeps only the newest result.
    pub fn latest(&self) -> Option<FrameResult> {
        let mut latest = self.rx.try_recv().ok()?;
        while let Ok(newer) = self.rx.try_recv() {
            latest = newer;
        }
        Some(latest)
    }

    /// Everything pending, oldest first.
    pub fn drain(&self) -> Vec<FrameResult> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// True once the producer has exited and nothing is left to read.
    pub fn is_finished(&self) -> bool {
        // Every publish happens before the flag is raised.
        self.closed.load(Ordering::Acquire) && self.rx.is_empty()
    }
}
