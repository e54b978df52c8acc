use crate::prelude::*;
use crate::config::{Output, Poll};

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// Polls the configured commands on a fixed interval and writes each response out.
pub struct Scheduler<T: Transport> {
    inverter: Arc<Inverter<T>>,
    poll: Poll,
    output: Output,
}

impl<T: Transport + Send + 'static> Scheduler<T> {
    pub fn new(inverter: Arc<Inverter<T>>, poll: Poll, output: Output) -> Self {
        Self {
            inverter,
            poll,
            output,
        }
    }

    pub async fn start<W: Write>(
        &self,
        out: &mut W,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let mut interval = tokio::time::interval(self.poll.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("polling every {:?}", self.poll.interval());

        loop {
            tokio::select! {
                _ = interval.tick() => self.poll_once(out).await?,
                _ = shutdown_rx.recv() => {
                    info!("scheduler received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Sends every configured command once. A failed exchange is logged and skipped; only
    /// failing to write the output is an error.
    pub async fn poll_once<W: Write>(&self, out: &mut W) -> Result<()> {
        for &command in self.poll.commands() {
            let inverter = self.inverter.clone();
            let result = tokio::task::spawn_blocking(move || inverter.send(command)).await?;

            match result {
                Ok(response) => {
                    debug!("{}: ok", command);
                    out.write_all(render(self.output, command, &response)?.as_bytes())?;
                    out.flush()?;
                }
                Err(e) => error!("{}: {}", command, e),
            }
        }

        Ok(())
    }
}

/// Formats one response in the configured output format.
pub fn render(output: Output, command: Command, response: &Response) -> Result<String> {
    match output {
        Output::Text => Ok(response.to_string()),
        Output::Json => {
            let line = serde_json::json!({
                "command": command.code(),
                "time": chrono::Local::now().to_rfc3339(),
                "response": response,
            });
            Ok(format!("{}\n", serde_json::to_string(&line)?))
        }
    }
}
