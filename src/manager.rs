use crossbeam::channel::Sender;
use tokio::task::JoinSet;
use tracing::{error, Level};
use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use crate::Command;

#[derive(Debug,Default)]
pub struct Manager {
    join_set: JoinSet<()>
}

impl Manager {

    /// Initializes the `Manager` and the process-wide tracing subscriber.
    /// A subscriber installed earlier is left in place.
    pub fn new(log_level: Level) -> Self {
        let _ = tracing_subscriber::fmt().with_max_level(log_level).with_line_number(true).try_init();
        Self {
            join_set: JoinSet::new()
        }
    }

    /// Runs the scheduler loop in the background until it receives a shutdown command.
    pub fn scheduler(&mut self, scheduler: Scheduler) {
        self.join_set.spawn(async move {
            scheduler.watch().await;
        });
    }

    /// Sends an operator command to a scheduler started by this manager.
    /// Fails once that scheduler has stopped and dropped its receiver.
    pub fn send_command(&self, command: Command, sender: &Sender<Command>) -> Result<()> {
        sender.send(command).map_err(|error| {
            error!("unable to send command: {}",error);
            Error::ChannelClosed {
                command: format!("{:?}",error.into_inner())
            }
        })
    }

    /// Waits for every scheduler to stop.
    pub async fn wait(self) -> Vec<()> {
        self.join_set.join_all().await
    }

}
