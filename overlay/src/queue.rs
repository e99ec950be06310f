//! Hand-off of work to the thread that owns the render surface.

use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};

use crate::{FatalError, QueueClosed};

/// A unit of work run on the render thread against its owned state
pub type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Posts jobs to the render thread. Jobs run in posting order.
pub trait RenderQueue<T>: Send + Sync + 'static {
    fn post(&self, job: Job<T>) -> Result<(), QueueClosed>;
}

/// Run `f` on the render thread and wait for its result.
///
/// Fails with `QueueClosed` if the job cannot be posted or is dropped
/// without running.
pub async fn round_trip<T, R, Q, F>(queue: &Q, f: F) -> Result<R, QueueClosed>
where
    Q: RenderQueue<T> + ?Sized,
    F: FnOnce(&mut T) -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    queue.post(Box::new(move |target: &mut T| {
        let _ = tx.send(f(target));
    }))?;
    rx.await.map_err(|_| QueueClosed)
}

/// A dedicated thread that owns a `T` and runs posted jobs against it.
///
/// `T` is built on the owner thread, so it does not have to be `Send`. The
/// thread exits once every queue handle is dropped.
pub struct ThreadQueue<T> {
    sender: mpsc::UnboundedSender<Job<T>>,
}

impl<T: 'static> ThreadQueue<T> {
    pub fn spawn<F>(name: &str, init: F) -> Result<(Self, JoinHandle<()>), FatalError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job<T>>();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut target = init();
                while let Some(job) = receiver.blocking_recv() {
                    job(&mut target);
                }
                debug!("Render thread {:?} finished", thread::current().name());
            })
            .map_err(FatalError::Spawn)?;

        Ok((Self { sender }, handle))
    }
}

impl<T> Clone for ThreadQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: 'static> RenderQueue<T> for ThreadQueue<T> {
    fn post(&self, job: Job<T>) -> Result<(), QueueClosed> {
        self.sender.send(job).map_err(|_| QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[tokio::test]
    async fn test_round_trip_returns_result() {
        let (queue, handle) = ThreadQueue::spawn("render-test", Vec::<u32>::new).unwrap();

        round_trip(&queue, |items: &mut Vec<u32>| items.push(1)).await.unwrap();
        round_trip(&queue, |items: &mut Vec<u32>| items.push(2)).await.unwrap();
        let items = round_trip(&queue, |items: &mut Vec<u32>| items.clone()).await.unwrap();
        assert_eq!(items, vec![1, 2]);

        drop(queue);
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_state_need_not_be_send() {
        // Rc is !Send; it only ever lives on the owner thread
        let (queue, _handle) = ThreadQueue::spawn("render-rc", || Rc::new(5u32)).unwrap();
        let value = round_trip(&queue, |rc: &mut Rc<u32>| **rc * 2).await.unwrap();
        assert_eq!(value, 10);
    }

    #[tokio::test]
    async fn test_dropped_job_is_queue_closed() {
        let (queue, handle) = ThreadQueue::spawn("render-panics", || 0u32).unwrap();

        let result = round_trip(&queue, |_: &mut u32| -> u32 { panic!("render thread died") }).await;
        assert_eq!(result, Err(QueueClosed));
        assert!(handle.join().is_err());

        assert_eq!(queue.post(Box::new(|_: &mut u32| {})), Err(QueueClosed));
    }
}
