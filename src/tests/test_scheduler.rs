#[cfg(all(test, unix))]
mod test_scheduler {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use crossbeam::channel::{unbounded, Receiver, Sender};
    use tempfile::TempDir;
    use crate::config::SchedulerConfig;
    use crate::job::{Job, JobStatus};
    use crate::scheduler::Scheduler;
    use crate::store::TriggerStore;
    use crate::tests::test_helper::{memory_store, test_config, wait_for_status, write_script, yesterday, MACHINE_NAME};
    use crate::trigger::{Trigger, TriggerStatus};
    use crate::Command;

    fn script(folder: &TempDir, name: &str, body: &str) -> String {
        let path: PathBuf = write_script(&folder.path().join(name), "main.sh", body);
        path.to_str().unwrap().to_string()
    }

    async fn finish(handle: tokio::task::JoinHandle<()>) {
        let result = tokio::time::timeout(Duration::from_secs(10), handle).await;
        assert!(result.is_ok(),"scheduler did not stop");
    }

    #[tokio::test]
    async fn test_tick_launches_and_reconciles(){
        let folder: TempDir = TempDir::new().unwrap();
        let store: Arc<dyn TriggerStore> = memory_store();
        let trigger: Trigger = store.create_trigger(Trigger::single("tick", "tick_process", &script(&folder, "tick", "exit 0"), yesterday())).await.unwrap();
        let (_tx, rx) = unbounded::<Command>();
        let mut scheduler: Scheduler = Scheduler::new(store.clone(), test_config(folder.path()), rx);
        assert!(scheduler.mode().running);
        assert!(!scheduler.mode().exclusive);

        scheduler.tick().await;
        assert_eq!(scheduler.supervisor().len(),1);
        assert!(store.get_scheduler(MACHINE_NAME).await.unwrap().is_some());

        for _ in 0..100 {
            if scheduler.supervisor().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            scheduler.tick().await;
        }
        assert!(scheduler.supervisor().is_empty());
        assert_eq!(store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Done);
    }

    #[tokio::test]
    async fn test_one_claim_per_tick(){
        let folder: TempDir = TempDir::new().unwrap();
        let store: Arc<dyn TriggerStore> = memory_store();
        let path: String = script(&folder, "pair", "sleep 1");
        store.create_trigger(Trigger::single("first", "first", &path, yesterday())).await.unwrap();
        store.create_trigger(Trigger::single("second", "second", &path, yesterday())).await.unwrap();
        let (_tx, rx) = unbounded::<Command>();
        let mut scheduler: Scheduler = Scheduler::new(store.clone(), test_config(folder.path()), rx);

        scheduler.tick().await;
        assert_eq!(scheduler.supervisor().len(),1);
        scheduler.tick().await;
        assert_eq!(scheduler.supervisor().len(),2);
    }

    #[tokio::test]
    async fn test_schedulers_share_store(){
        let folder: TempDir = TempDir::new().unwrap();
        let store: Arc<dyn TriggerStore> = memory_store();
        let trigger: Trigger = store.create_trigger(Trigger::single("shared", "shared", &script(&folder, "shared", "sleep 1"), yesterday())).await.unwrap();

        let mut other_config: SchedulerConfig = test_config(folder.path());
        other_config.machine_name = "other-machine".to_string();
        let (_tx_a, rx_a) = unbounded::<Command>();
        let (_tx_b, rx_b) = unbounded::<Command>();
        let mut scheduler_a: Scheduler = Scheduler::new(store.clone(), test_config(folder.path()), rx_a);
        let mut scheduler_b: Scheduler = Scheduler::new(store.clone(), other_config, rx_b);

        tokio::join!(scheduler_a.tick(), scheduler_b.tick());
        assert_eq!(scheduler_a.supervisor().len() + scheduler_b.supervisor().len(),1);
        assert_eq!(store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Running);
    }

    #[tokio::test]
    async fn test_exclusive_from_config(){
        let folder: TempDir = TempDir::new().unwrap();
        let store: Arc<dyn TriggerStore> = memory_store();
        store.create_trigger(Trigger::single("open", "open", &script(&folder, "open", "exit 0"), yesterday())).await.unwrap();
        let mut config: SchedulerConfig = test_config(folder.path());
        config.exclusive_mode = true;
        let (_tx, rx) = unbounded::<Command>();
        let mut scheduler: Scheduler = Scheduler::new(store.clone(), config, rx);
        assert!(scheduler.mode().exclusive);

        scheduler.tick().await;
        assert!(scheduler.supervisor().is_empty());
    }

    #[tokio::test]
    async fn test_watch_runs_until_graceful_shutdown(){
        let folder: TempDir = TempDir::new().unwrap();
        let store: Arc<dyn TriggerStore> = memory_store();
        let trigger: Trigger = store.create_trigger(Trigger::single("watched", "watched", &script(&folder, "watched", "sleep 1"), yesterday())).await.unwrap();
        let (tx, rx): (Sender<Command>, Receiver<Command>) = unbounded::<Command>();
        let scheduler: Scheduler = Scheduler::new(store.clone(), test_config(folder.path()), rx);
        let handle = tokio::spawn(scheduler.watch());

        wait_for_status(&store, &trigger.id, TriggerStatus::Running).await;
        tx.send(Command::SchedulerGracefulShutdown).unwrap();
        finish(handle).await;
        // The running job was drained before the loop stopped.
        assert_eq!(store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Done);
    }

    #[tokio::test]
    async fn test_pause_and_resume_commands(){
        let folder: TempDir = TempDir::new().unwrap();
        let store: Arc<dyn TriggerStore> = memory_store();
        let trigger: Trigger = store.create_trigger(Trigger::single("resumed", "resumed", &script(&folder, "resumed", "exit 0"), yesterday())).await.unwrap();
        let (tx, rx): (Sender<Command>, Receiver<Command>) = unbounded::<Command>();
        tx.send(Command::SchedulerPause).unwrap();
        let scheduler: Scheduler = Scheduler::new(store.clone(), test_config(folder.path()), rx);
        let handle = tokio::spawn(scheduler.watch());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Idle);
        // Paused schedulers still report their heartbeat.
        assert!(store.get_scheduler(MACHINE_NAME).await.unwrap().is_some());

        tx.send(Command::SchedulerResume).unwrap();
        wait_for_status(&store, &trigger.id, TriggerStatus::Done).await;
        tx.send(Command::SchedulerForceShutdown).unwrap();
        finish(handle).await;
    }

    #[tokio::test]
    async fn test_shutdown_while_paused(){
        let folder: TempDir = TempDir::new().unwrap();
        let store: Arc<dyn TriggerStore> = memory_store();
        let trigger: Trigger = store.create_trigger(Trigger::single("never", "never", &script(&folder, "never", "exit 0"), yesterday())).await.unwrap();
        let (tx, rx): (Sender<Command>, Receiver<Command>) = unbounded::<Command>();
        tx.send(Command::SchedulerPause).unwrap();
        tx.send(Command::SchedulerGracefulShutdown).unwrap();
        let scheduler: Scheduler = Scheduler::new(store.clone(), test_config(folder.path()), rx);

        finish(tokio::spawn(scheduler.watch())).await;
        assert_eq!(store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Idle);
    }

    #[tokio::test]
    async fn test_kill_job_command(){
        let folder: TempDir = TempDir::new().unwrap();
        let store: Arc<dyn TriggerStore> = memory_store();
        let trigger: Trigger = store.create_trigger(Trigger::single("endless", "endless", &script(&folder, "endless", "sleep 30"), yesterday())).await.unwrap();
        let (tx, rx): (Sender<Command>, Receiver<Command>) = unbounded::<Command>();
        let mut scheduler: Scheduler = Scheduler::new(store.clone(), test_config(folder.path()), rx);
        scheduler.tick().await;
        let job_ids: Vec<String> = scheduler.supervisor().job_ids();
        assert_eq!(job_ids.len(),1);

        tx.send(Command::KillJob(job_ids[0].clone())).unwrap();
        tx.send(Command::SchedulerGracefulShutdown).unwrap();
        finish(tokio::spawn(scheduler.watch())).await;

        let job: Job = store.get_job(&job_ids[0]).await.unwrap();
        assert_eq!(job.status,JobStatus::Killed);
        assert_eq!(store.get_trigger(&trigger.id).await.unwrap().status,TriggerStatus::Failed);
    }
}
