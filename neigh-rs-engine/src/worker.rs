use crossbeam::crossbeam_channel;
use crossbeam::crossbeam_channel::TrySendError;
use std::thread;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single dedicated thread draining a bounded queue of jobs. Frame
/// delivery hands completions and event publication here so consumer code
/// never runs on the delivery thread.
pub struct CompletionWorker {
    sender: Option<crossbeam_channel::Sender<Job>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CompletionWorker {
    pub fn spawn(capacity: usize) -> CompletionWorker {
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(capacity);
        let handle = thread::Builder::new()
            .name("neigh-completion".to_string())
            .spawn(move || {
                for job in receiver.iter() {
                    job();
                }
            })
            .unwrap();

        CompletionWorker {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Queues a job for the worker thread. When the queue is full (or the
    /// worker is gone) the job runs on the calling thread instead; returns
    /// false so the caller can count the overflow.
    pub fn submit(&self, job: Job) -> bool {
        match self.sender.as_ref().unwrap().try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                job();
                false
            }
        }
    }

    /// Blocks until every job submitted before this call has run.
    pub fn flush(&self) {
        let (done, wait) = crossbeam_channel::bounded::<()>(1);
        self.submit(Box::new(move || {
            let _ = done.send(());
        }));
        let _ = wait.recv();
    }
}

impl Drop for CompletionWorker {
    fn drop(&mut self) {
        // Disconnect the channel so the worker loop ends, then join.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
