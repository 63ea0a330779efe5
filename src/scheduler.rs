use std::sync::Arc;
use crossbeam::channel::{Receiver, TryRecvError};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use crate::config::SchedulerConfig;
use crate::launcher::ProcessLauncher;
use crate::selector::TriggerSelector;
use crate::store::TriggerStore;
use crate::supervisor::JobSupervisor;
use crate::Command;

/// Operator switches, read at the start of every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingMode {
    pub running: bool,
    pub exclusive: bool,
}

/// What the loop should do after handling a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Drain,
    Stop,
}

/// The driving loop of one scheduler instance.
pub struct Scheduler {
    config: Arc<SchedulerConfig>,
    store: Arc<dyn TriggerStore>,
    selector: TriggerSelector,
    launcher: ProcessLauncher,
    supervisor: JobSupervisor,
    mode: OperatingMode,
    draining: bool,
    rx: Receiver<Command>,
}

impl Scheduler {

    pub fn new(store: Arc<dyn TriggerStore>, config: SchedulerConfig, rx: Receiver<Command>) -> Self {
        let config: Arc<SchedulerConfig> = Arc::new(config);
        Self {
            selector: TriggerSelector::new(store.clone()),
            launcher: ProcessLauncher::new(store.clone(), config.clone()),
            supervisor: JobSupervisor::new(store.clone(), config.checkout_root.clone()),
            mode: OperatingMode {
                running: true,
                exclusive: config.exclusive_mode,
            },
            draining: false,
            store,
            config,
            rx,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn supervisor(&self) -> &JobSupervisor {
        &self.supervisor
    }

    /// One pass of the loop: heartbeat, reconcile running jobs and, while
    /// running, claim and launch at most one new trigger.
    pub async fn tick(&mut self) {
        if let Err(error) = self.store.send_ping_from_scheduler(&self.config.machine_name).await {
            error!("scheduler heartbeat error: {}",error);
        }
        self.supervisor.reconcile().await;
        if !self.mode.running {
            return;
        }
        let candidate = {
            let running = self.supervisor.running_triggers();
            self.selector.select_next(&running, &self.config.machine_name, self.mode.exclusive).await
        };
        if let Some(trigger) = candidate {
            if let Some(job) = self.launcher.launch(trigger).await {
                self.supervisor.track(job);
            }
        }
    }

    /// Applies one operator command.
    async fn apply(&mut self, command: Command) -> Flow {
        match command {
            Command::SchedulerResume => {
                info!("resumed scheduler {}",self.config.machine_name);
                self.mode.running = true;
            }
            Command::SchedulerPause => {
                info!("paused scheduler {}",self.config.machine_name);
                self.mode.running = false;
            }
            Command::SetExclusive(exclusive) => {
                info!("exclusive mode of scheduler {} set to {}",self.config.machine_name,exclusive);
                self.mode.exclusive = exclusive;
            }
            Command::KillJob(job_id) => {
                if !self.supervisor.kill_job(&job_id).await {
                    warn!("job {} is not supervised by {}",job_id,self.config.machine_name);
                }
            }
            Command::SchedulerGracefulShutdown => {
                info!("graceful shutdown of scheduler {} requested",self.config.machine_name);
                self.mode.running = false;
                return Flow::Drain;
            }
            Command::SchedulerForceShutdown => {
                info!("forced shutdown scheduler {}",self.config.machine_name);
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Drains every command waiting on the channel.
    async fn poll_commands(&mut self) -> Flow {
        loop {
            match self.rx.try_recv() {
                Ok(command) => match self.apply(command).await {
                    Flow::Continue => {}
                    Flow::Drain => self.draining = true,
                    Flow::Stop => return Flow::Stop,
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if self.draining {
            self.mode.running = false;
            return Flow::Drain;
        }
        Flow::Continue
    }

    #[instrument(skip_all, fields(scheduler = %self.config.machine_name))]
    /// Runs the loop until a shutdown command arrives.
    ///
    /// The loop ticks every `tick_interval` while the scheduler is running or
    /// jobs are still supervised. Once paused with nothing left to supervise it
    /// goes idle and waits for the next command.
    pub async fn watch(mut self) {
        info!("scheduler {} started",self.config.machine_name);
        loop {
            match self.poll_commands().await {
                Flow::Stop => break,
                Flow::Drain if self.supervisor.is_empty() => {
                    info!("graceful shutdown scheduler {}",self.config.machine_name);
                    break;
                }
                _ => {}
            }

            self.tick().await;

            if !self.mode.running && self.supervisor.is_empty() && !self.draining {
                info!("scheduler {} is idle",self.config.machine_name);
                match wait_for_command(self.rx.clone()).await {
                    Some(command) => match self.apply(command).await {
                        Flow::Continue => continue,
                        Flow::Drain | Flow::Stop => break,
                    },
                    None => {
                        info!("command channel of scheduler {} closed",self.config.machine_name);
                        break;
                    }
                }
            }
            debug!("scheduler sleeping for {:?}",self.config.tick_interval);
            tokio::time::sleep_until(Instant::now() + self.config.tick_interval).await;
        }
        info!("scheduler {} stopped with {} job(s) still running",self.config.machine_name,self.supervisor.len());
    }
}

/// Blocks until the next command arrives. `None` when every sender is gone.
async fn wait_for_command(rx: Receiver<Command>) -> Option<Command> {
    match tokio::task::spawn_blocking(move || rx.recv()).await {
        Ok(Ok(command)) => Some(command),
        _ => None,
    }
}
