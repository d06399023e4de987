use log::{info, warn};

use crate::{
    config::CommConfig,
    hal::UartTx,
    link::LinkSender,
    protocol::Command,
    queue::{BoundedQueue, Notifier},
};

use super::CommStats;

/// Drains an outbound queue onto the UART link
pub struct DroneCommTask<'a, T, const N: usize> {
    sender: LinkSender<T>,
    queue: &'a BoundedQueue<Command, N>,
    notifier: &'a Notifier,
    config: CommConfig,
    stats: CommStats,
}

impl<'a, T, const N: usize> DroneCommTask<'a, T, N>
where
    T: UartTx,
{
    pub fn new(
        tx: T,
        queue: &'a BoundedQueue<Command, N>,
        notifier: &'a Notifier,
        config: CommConfig,
    ) -> Self {
        Self {
            sender: LinkSender::new(tx).with_retries(config.send_retries, config.retry_backoff),
            queue,
            notifier,
            config,
            stats: CommStats::default(),
        }
    }

    pub fn stats(&self) -> &CommStats {
        &self.stats
    }

    pub fn tx(&mut self) -> &mut T {
        self.sender.tx()
    }

    /// Waits for a notification (or its timeout), then sends everything queued.
    /// Returns the number of frames written.
    pub async fn step(&mut self) -> usize {
        self.notifier.wait(self.config.notify_timeout).await;

        let mut next = self.queue.pop(self.config.queue_timeout).await.ok();
        let mut sent = 0;
        while let Some(cmd) = next {
            match self.sender.send(&cmd).await {
                Ok(()) => {
                    sent += 1;
                    self.stats.forwarded += 1;
                }
                Err(err) => {
                    self.stats.errors += 1;
                    warn!("{:?} frame lost: {err:?}", cmd.kind());
                }
            }
            next = self.queue.try_pop().ok();
        }
        sent
    }

    pub async fn run(mut self) -> ! {
        info!("Drone comm task started");
        loop {
            self.step().await;
        }
    }
}
