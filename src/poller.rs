use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::meter::MeterReading;
use crate::reader::PowerReader;

/// Drives a reader on a fixed cadence and forwards successful readings
/// via the provided channel.
///
/// Polls never overlap: the loop awaits each read inline, and a tick
/// that would fire while a poll is still in flight is dropped, never
/// queued. A second concurrent request could race the digest handshake
/// on the device.
pub struct Poller<R: PowerReader> {
    reader: R,
    output: Sender<MeterReading>,
    period: Duration,
}

impl<R: PowerReader> Poller<R> {
    pub fn new(reader: R, output: Sender<MeterReading>, period: Duration) -> Self {
        Self {
            reader,
            output,
            period,
        }
    }

    /// Spawns the poll loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut poller = self;
            poller.run().await;
        })
    }

    /// Main poll loop. A failed cycle is logged and the next cycle
    /// proceeds normally; the loop only exits when the reading consumer
    /// goes away.
    async fn run(&mut self) {
        info!(period = ?self.period, "starting poll loop");
        let mut ticks = interval(self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticks.tick().await;
            match self.reader.read().await {
                Ok(Some(reading)) => {
                    if self.output.send(reading).await.is_err() {
                        debug!("reading consumer dropped, stopping poll loop");
                        break;
                    }
                }
                Ok(None) => debug!("poll cycle produced no reading"),
                Err(e) => warn!(error = %e, "poll cycle failed"),
            }
            // A poll that outlives the next deadline leaves one elapsed
            // tick buffered in the interval; Skip only realigns the
            // deadlines after it. Consume it here so an overlapped tick
            // is dropped, never replayed as a back-to-back poll.
            while timeout(Duration::ZERO, ticks.tick()).await.is_ok() {}
        }
    }
}
