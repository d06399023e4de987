use embassy_time::Ticker;
use log::{debug, info, warn};

use crate::{
    config::CommConfig,
    hal::Radio,
    protocol::{decode_packet, encode_packet, Command, PACKET_LEN},
    queue::{BoundedQueue, Notifier},
};

use super::CommStats;

/// Bridges the pilot radio and the board-to-board queues. MOVE packets from the
/// handset go towards the drone, INFO from the drone goes back over the air.
pub struct RcCommTask<'a, R, const TO_DRONE: usize, const FROM_DRONE: usize> {
    radio: R,
    to_drone: &'a BoundedQueue<Command, TO_DRONE>,
    to_drone_notify: &'a Notifier,
    from_drone: &'a BoundedQueue<Command, FROM_DRONE>,
    from_drone_notify: &'a Notifier,
    config: CommConfig,
    stats: CommStats,
}

impl<'a, R, const TO_DRONE: usize, const FROM_DRONE: usize> RcCommTask<'a, R, TO_DRONE, FROM_DRONE>
where
    R: Radio,
{
    pub fn new(
        radio: R,
        to_drone: &'a BoundedQueue<Command, TO_DRONE>,
        to_drone_notify: &'a Notifier,
        from_drone: &'a BoundedQueue<Command, FROM_DRONE>,
        from_drone_notify: &'a Notifier,
        config: CommConfig,
    ) -> Self {
        Self {
            radio,
            to_drone,
            to_drone_notify,
            from_drone,
            from_drone_notify,
            config,
            stats: CommStats::default(),
        }
    }

    pub fn stats(&self) -> &CommStats {
        &self.stats
    }

    pub fn radio(&mut self) -> &mut R {
        &mut self.radio
    }

    async fn receive_pilot(&mut self) -> Result<(), R::Error> {
        while self.radio.data_available().await? {
            let mut packet = [0u8; PACKET_LEN];
            let len = self.radio.receive(&mut packet).await?;
            let cmd = match packet.get(..len).map(decode_packet) {
                Some(Ok(cmd @ Command::Move(_))) => cmd,
                Some(Ok(Command::Info(_))) => {
                    debug!("Ignoring INFO from the handset");
                    continue;
                }
                Some(Err(err)) => {
                    debug!("Bad radio packet: {err:?}");
                    continue;
                }
                None => {
                    debug!("Radio reported {len} bytes for a {PACKET_LEN} byte packet");
                    continue;
                }
            };
            self.stats.received += 1;
            match self.to_drone.push(cmd, self.config.queue_timeout).await {
                Ok(()) => self.to_drone_notify.notify(),
                Err(err) => {
                    self.stats.dropped += 1;
                    warn!("MOVE dropped: {err:?}");
                }
            }
        }
        Ok(())
    }

    async fn forward_telemetry(&mut self) -> Result<(), R::Error> {
        // Polled every period, the wakeup only needs clearing
        self.from_drone_notify.take();
        while let Ok(cmd) = self.from_drone.try_pop() {
            self.radio.send(&encode_packet(&cmd)).await?;
            self.stats.forwarded += 1;
        }
        Ok(())
    }

    pub async fn step(&mut self) -> Result<(), R::Error> {
        self.receive_pilot().await?;
        self.forward_telemetry().await
    }

    pub async fn run(mut self) -> ! {
        info!("RC comm task running every {}us", self.config.period.as_micros());
        let mut ticker = Ticker::every(self.config.period);
        loop {
            if let Err(err) = self.step().await {
                warn!("Radio error: {err:?}");
                self.stats.errors += 1;
            }
            ticker.next().await;
        }
    }
}
