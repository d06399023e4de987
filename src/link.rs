//! Both ends of a board-to-board UART link

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::{Duration, Timer};
use log::{debug, trace, warn};

use crate::{
    hal::UartTx,
    protocol::{encode_frame, Command, FrameParser},
    queue::{BoundedQueue, Notifier},
};

/// Receive side of one UART link. [`LinkReceiver::on_byte`] is the only handler the
/// UART interrupt calls; it never blocks.
pub struct LinkReceiver<'a, const N: usize> {
    parser: Mutex<CriticalSectionRawMutex, RefCell<FrameParser>>,
    /// Parser progress seen at the previous stall check
    last_progress: Mutex<CriticalSectionRawMutex, Cell<Option<u32>>>,
    dropped: Mutex<CriticalSectionRawMutex, Cell<u32>>,
    queue: &'a BoundedQueue<Command, N>,
    notifier: &'a Notifier,
}

impl<'a, const N: usize> LinkReceiver<'a, N> {
    pub const fn new(queue: &'a BoundedQueue<Command, N>, notifier: &'a Notifier) -> Self {
        Self {
            parser: Mutex::new(RefCell::new(FrameParser::new())),
            last_progress: Mutex::new(Cell::new(None)),
            dropped: Mutex::new(Cell::new(0)),
            queue,
            notifier,
        }
    }

    /// Drives the parser one byte. A completed command goes to the queue and the
    /// consumer is notified; if the queue is full the command is lost.
    pub fn on_byte(&self, byte: u8) {
        let Some(cmd) = self.parser.lock(|p| p.borrow_mut().push(byte)) else {
            return;
        };
        match self.queue.try_push(cmd) {
            Ok(()) => self.notifier.notify(),
            Err(_) => {
                self.dropped.lock(|d| d.set(d.get().wrapping_add(1)));
                trace!("Link queue full, command dropped");
            }
        }
    }

    pub fn on_bytes(&self, bytes: &[u8]) {
        bytes.iter().for_each(|&b| self.on_byte(b));
    }

    pub fn is_idle(&self) -> bool {
        self.parser.lock(|p| p.borrow().is_idle())
    }

    pub fn reset(&self) {
        self.parser.lock(|p| p.borrow_mut().reset());
        self.last_progress.lock(|l| l.set(None));
    }

    /// Drops a partial frame that made no progress since the previous call.
    /// Returns `true` if a frame was discarded.
    pub fn expire_stalled(&self) -> bool {
        let expired = self.parser.lock(|p| {
            let mut parser = p.borrow_mut();
            if parser.is_idle() {
                self.last_progress.lock(|l| l.set(None));
                return false;
            }
            let progress = parser.progress();
            let stalled = self.last_progress.lock(|l| l.replace(Some(progress))) == Some(progress);
            if stalled {
                parser.reset();
                self.last_progress.lock(|l| l.set(None));
            }
            stalled
        });
        if expired {
            debug!("Expired stalled UART frame");
        }
        expired
    }

    /// Commands lost to a full queue
    pub fn dropped(&self) -> u32 {
        self.dropped.lock(|d| d.get())
    }

    pub fn queue(&self) -> &'a BoundedQueue<Command, N> {
        self.queue
    }

    pub fn notifier(&self) -> &'a Notifier {
        self.notifier
    }
}

/// Transmit side of a UART link
pub struct LinkSender<T> {
    tx: T,
    retries: u8,
    backoff: Duration,
}

impl<T: UartTx> LinkSender<T> {
    pub fn new(tx: T) -> Self {
        Self {
            tx,
            retries: 3,
            backoff: Duration::from_millis(1),
        }
    }

    pub fn with_retries(mut self, retries: u8, backoff: Duration) -> Self {
        self.retries = retries.max(1);
        self.backoff = backoff;
        self
    }

    pub fn tx(&mut self) -> &mut T {
        &mut self.tx
    }

    /// Writes one frame byte by byte. Each byte is retried with a fixed backoff;
    /// the frame is abandoned after the last failed attempt.
    pub async fn send(&mut self, cmd: &Command) -> Result<(), T::Error> {
        for &byte in encode_frame(cmd).iter() {
            let mut attempt = 1;
            loop {
                match self.tx.send_byte(byte).await {
                    Ok(()) => break,
                    Err(err) if attempt >= self.retries => {
                        warn!("UART send failed after {attempt} attempts: {err:?}");
                        return Err(err);
                    }
                    Err(_) => {
                        attempt += 1;
                        Timer::after(self.backoff).await;
                    }
                }
            }
        }
        Ok(())
    }
}
