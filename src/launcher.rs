use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tracing::{error, info, instrument, warn};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::job::{Job, JobStatus, SchedulerJob};
use crate::process_log::LogLevel;
use crate::store::TriggerStore;
use crate::trigger::{Trigger, TriggerStatus};

/// Starts claimed triggers as child processes.
///
/// Every child receives the same positional arguments:
/// `entry_point process_name connection_string crypto_key process_args trigger_id job_id`,
/// run through the configured runtime.
pub struct ProcessLauncher {
    store: Arc<dyn TriggerStore>,
    config: Arc<SchedulerConfig>,
}

impl ProcessLauncher {

    pub fn new(store: Arc<dyn TriggerStore>, config: Arc<SchedulerConfig>) -> Self {
        Self {
            store,
            config
        }
    }

    /// Launches `trigger`. On any failure the trigger is marked Failed, the
    /// reason is written to the store log and `None` is returned.
    #[instrument(skip_all, fields(trigger = %trigger.name))]
    pub async fn launch(&self, trigger: Trigger) -> Option<SchedulerJob> {
        let mut checkout: Option<PathBuf> = None;
        match self.try_launch(&trigger, &mut checkout).await {
            Ok((job, child)) => {
                info!("started {} as job {}",trigger.process_name,job.id);
                if let Err(error) = self.store.start_trigger_from_machine(&self.config.machine_name, &trigger.name).await {
                    warn!("unable to record start of {}: {}",trigger.name,error);
                }
                Some(SchedulerJob::new(trigger, job, checkout, child))
            }
            Err(error) => {
                error!("unable to launch {}: {}",trigger.name,error);
                if let Err(error) = self.store.set_trigger_status(&trigger.id, TriggerStatus::Failed).await {
                    error!("unable to mark {} as failed: {}",trigger.name,error);
                }
                let message: String = format!("Unable to launch trigger {}: {}",trigger.name,error);
                if let Err(error) = self.store.create_log(&trigger.process_name, LogLevel::Error, &message).await {
                    error!("unable to write log for {}: {}",trigger.name,error);
                }
                if let Some(folder) = checkout {
                    remove_checkout(&folder).await;
                }
                None
            }
        }
    }

    async fn try_launch(&self, trigger: &Trigger, checkout: &mut Option<PathBuf>) -> Result<(Job, Child)> {
        let entry_point: PathBuf = if trigger.is_git_repo {
            let folder: PathBuf = self.config.checkout_root.join(uuid::Uuid::new_v4().to_string());
            *checkout = Some(folder.clone());
            self.clone_repository(trigger, &folder).await?;
            find_entry_point(&folder, &self.config.entry_point_name)?
        } else {
            PathBuf::from(&trigger.process_path)
        };
        self.validate(&entry_point)?;

        let job: Job = self.store.start_job(&trigger.process_name, &self.config.machine_name).await?;
        match self.spawn(trigger, &job, &entry_point) {
            Ok(child) => Ok((job, child)),
            Err(error) => {
                // The job never ran; close it right away instead of leaving it Running.
                if let Err(error) = self.store.set_job_status(&job.id, JobStatus::Failed).await {
                    error!("unable to close job {}: {}",job.id,error);
                }
                Err(error)
            }
        }
    }

    async fn clone_repository(&self, trigger: &Trigger, folder: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.checkout_root).await?;
        let mut command: Command = Command::new(&self.config.git_program);
        command.arg("clone");
        if let Some(branch) = &trigger.git_branch {
            command.arg("--branch").arg(branch);
        }
        command.arg(&trigger.process_path)
            .arg(folder)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let output = command.output().await.map_err(|error| Error::Checkout {
            url: trigger.process_path.clone(),
            message: error.to_string()
        })?;
        if !output.status.success() {
            return Err(Error::Checkout {
                url: trigger.process_path.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string()
            });
        }
        Ok(())
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::InvalidProcessPath {
                path: path.to_path_buf(),
                message: "file does not exist".to_string()
            });
        }
        let extension: Option<&str> = path.extension().and_then(|value| value.to_str());
        if extension != Some(self.config.process_extension.as_str()) {
            return Err(Error::InvalidProcessPath {
                path: path.to_path_buf(),
                message: format!("expected a .{} file",self.config.process_extension)
            });
        }
        Ok(())
    }

    fn spawn(&self, trigger: &Trigger, job: &Job, entry_point: &Path) -> Result<Child> {
        Command::new(&self.config.runtime)
            .arg(entry_point)
            .arg(&trigger.process_name)
            .arg(&self.config.connection_string)
            .arg(&self.config.crypto_key)
            .arg(&trigger.process_args)
            .arg(&trigger.id)
            .arg(&job.id)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                runtime: self.config.runtime.clone(),
                path: entry_point.to_path_buf(),
                source
            })
    }
}

/// Searches `folder` recursively for a file called `name`.
/// Entries are visited in sorted order and the first match wins.
pub fn find_entry_point(folder: &Path, name: &str) -> Result<PathBuf> {
    let mut pending: Vec<PathBuf> = vec![folder.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&current)?
            .filter_map(|entry| entry.ok().map(|item| item.path()))
            .collect();
        entries.sort();
        let mut subfolders: Vec<PathBuf> = Vec::new();
        for entry in entries {
            if entry.is_dir() {
                if entry.file_name().is_some_and(|value| value == ".git") {
                    continue;
                }
                subfolders.push(entry);
            } else if entry.file_name().is_some_and(|value| value == name) {
                return Ok(entry);
            }
        }
        // Reversed so the stack pops them in sorted order.
        pending.extend(subfolders.into_iter().rev());
    }
    Err(Error::EntryPointNotFound {
        name: name.to_string(),
        folder: folder.to_path_buf()
    })
}

pub(crate) async fn remove_checkout(folder: &Path) {
    if let Err(error) = tokio::fs::remove_dir_all(folder).await {
        if error.kind() != std::io::ErrorKind::NotFound {
            warn!("unable to remove checkout {:?}: {}",folder,error);
        }
    }
}
