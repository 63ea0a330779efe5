#[cfg(all(test, unix))]
mod test_supervisor {
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;
    use crate::config::SchedulerConfig;
    use crate::job::{Job, JobStatus, SchedulerJob};
    use crate::launcher::ProcessLauncher;
    use crate::process_log::{LogEntry, LogLevel};
    use crate::store::TriggerStore;
    use crate::supervisor::JobSupervisor;
    use crate::tests::test_helper::{claim, memory_store, test_config, wait_for_jobs, write_script, yesterday};
    use crate::trigger::{Trigger, TriggerStatus};

    struct Fixture {
        folder: TempDir,
        config: SchedulerConfig,
        store: Arc<dyn TriggerStore>,
        supervisor: JobSupervisor,
    }

    impl Fixture {
        fn new() -> Self {
            let folder: TempDir = TempDir::new().unwrap();
            let config: SchedulerConfig = test_config(folder.path());
            let store: Arc<dyn TriggerStore> = memory_store();
            let supervisor: JobSupervisor = JobSupervisor::new(store.clone(), config.checkout_root.clone());
            Self { folder, config, store, supervisor }
        }

        fn script(&self, name: &str, body: &str) -> String {
            let path: PathBuf = write_script(&self.folder.path().join(name), "main.sh", body);
            path.to_str().unwrap().to_string()
        }

        /// Claims and launches `trigger`, tracking the resulting job. Returns the job id.
        async fn start(&mut self, trigger: Trigger) -> String {
            let trigger: Trigger = claim(&self.store, trigger).await;
            let launcher: ProcessLauncher = ProcessLauncher::new(self.store.clone(), Arc::new(self.config.clone()));
            let job: SchedulerJob = launcher.launch(trigger).await.unwrap();
            let job_id: String = job.job.id.clone();
            self.supervisor.track(job);
            job_id
        }
    }

    #[tokio::test]
    async fn test_single_trigger_done(){
        let mut fixture: Fixture = Fixture::new();
        let path: String = fixture.script("single", "exit 0");
        let trigger: Trigger = Trigger::single("single", "single_process", &path, yesterday());
        let job_id: String = fixture.start(trigger.clone()).await;
        assert_eq!(fixture.supervisor.len(),1);
        assert_eq!(fixture.supervisor.job_ids(),vec![job_id.clone()]);
        assert_eq!(fixture.supervisor.running_triggers()[0].id,trigger.id);

        wait_for_jobs(&mut fixture.supervisor).await;
        assert_eq!(fixture.store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Done);
        let job: Job = fixture.store.get_job(&job_id).await.unwrap();
        assert_eq!(job.status,JobStatus::Done);
        assert!(job.end_time.is_some());
        assert!(fixture.store.get_logs("single_process").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recurring_triggers_rearm(){
        let mut fixture: Fixture = Fixture::new();
        let path: String = fixture.script("recurring", "exit 0");
        let scheduled: Trigger = Trigger::scheduled("scheduled", "scheduled_process", &path, "0 0 * * *", yesterday());
        let queue: Trigger = Trigger::queue("queue", "queue_process", &path, "orders", 1);
        fixture.store.create_queue_element("orders", None, None).await.unwrap();
        fixture.start(scheduled.clone()).await;
        fixture.start(queue.clone()).await;
        assert_eq!(fixture.supervisor.len(),2);

        wait_for_jobs(&mut fixture.supervisor).await;
        assert_eq!(fixture.store.get_trigger(&scheduled.id).await.unwrap().status,TriggerStatus::Idle);
        assert_eq!(fixture.store.get_trigger(&queue.id).await.unwrap().status,TriggerStatus::Idle);
    }

    #[tokio::test]
    async fn test_failure_logs_stderr(){
        let mut fixture: Fixture = Fixture::new();
        let path: String = fixture.script("failing", "echo 'connection refused' >&2\nexit 3");
        let trigger: Trigger = Trigger::scheduled("failing", "failing_process", &path, "0 0 * * *", yesterday());
        let job_id: String = fixture.start(trigger.clone()).await;

        wait_for_jobs(&mut fixture.supervisor).await;
        assert_eq!(fixture.store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Failed);
        let job: Job = fixture.store.get_job(&job_id).await.unwrap();
        assert_eq!(job.status,JobStatus::Failed);
        assert!(job.end_time.is_some());
        let logs: Vec<LogEntry> = fixture.store.get_logs("failing_process").await.unwrap();
        assert_eq!(logs.len(),1);
        assert_eq!(logs[0].level,LogLevel::Error);
        assert_eq!(logs[0].message,"connection refused");
    }

    #[tokio::test]
    async fn test_failure_without_stderr(){
        let mut fixture: Fixture = Fixture::new();
        let path: String = fixture.script("silent", "exit 4");
        let trigger: Trigger = Trigger::single("silent", "silent_process", &path, yesterday());
        fixture.start(trigger.clone()).await;

        wait_for_jobs(&mut fixture.supervisor).await;
        let logs: Vec<LogEntry> = fixture.store.get_logs("silent_process").await.unwrap();
        assert_eq!(logs.len(),1);
        assert_eq!(logs[0].message,"Process silent_process exited with code 4");
    }

    #[tokio::test]
    async fn test_pause_requested_while_running(){
        let mut fixture: Fixture = Fixture::new();
        let path: String = fixture.script("pausing", "sleep 1");
        let trigger: Trigger = Trigger::scheduled("pausing", "pausing_process", &path, "0 0 * * *", yesterday());
        fixture.start(trigger.clone()).await;

        assert_eq!(fixture.store.pause_trigger(&trigger.id).await.unwrap(),TriggerStatus::Pausing);
        fixture.supervisor.reconcile().await;
        assert_eq!(fixture.supervisor.len(),1);

        wait_for_jobs(&mut fixture.supervisor).await;
        assert_eq!(fixture.store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Paused);
    }

    #[tokio::test]
    async fn test_kill_job(){
        let mut fixture: Fixture = Fixture::new();
        let path: String = fixture.script("endless", "sleep 30");
        let trigger: Trigger = Trigger::single("endless", "endless_process", &path, yesterday());
        let job_id: String = fixture.start(trigger.clone()).await;

        assert!(!fixture.supervisor.kill_job("unknown").await);
        assert!(fixture.supervisor.kill_job(&job_id).await);
        assert!(fixture.supervisor.is_empty());

        let job: Job = fixture.store.get_job(&job_id).await.unwrap();
        assert_eq!(job.status,JobStatus::Killed);
        assert!(job.end_time.is_some());
        assert_eq!(fixture.store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Failed);
        let logs: Vec<LogEntry> = fixture.store.get_logs("endless_process").await.unwrap();
        assert_eq!(logs.len(),1);
        assert!(logs[0].message.contains("killed"),"{}",logs[0].message);

        // A late reconcile must not rewrite the killed job.
        fixture.supervisor.reconcile().await;
        assert_eq!(fixture.store.get_job(&job_id).await.unwrap(),job);
    }

    #[tokio::test]
    async fn test_checkout_root_wiped_when_idle(){
        let mut fixture: Fixture = Fixture::new();
        let stale: PathBuf = fixture.config.checkout_root.join("stale");
        std::fs::create_dir_all(&stale).unwrap();
        fixture.supervisor.reconcile().await;
        assert!(!fixture.config.checkout_root.exists());
    }
}
