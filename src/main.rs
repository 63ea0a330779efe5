use std::sync::Arc;
use crossbeam::channel::unbounded;
use tracing::{error, info};
use triggerd::config::SchedulerConfig;
use triggerd::database::Db;
use triggerd::manager::Manager;
use triggerd::scheduler::Scheduler;
use triggerd::store::{SurrealStore, TriggerStore};
use triggerd::Command;

#[tokio::main]
async fn main() {
    let config: SchedulerConfig = SchedulerConfig::default();
    let mut manager: Manager = Manager::new(config.log_level);

    let db: Db = match Db::new(None).await {
        Ok(db) => db,
        Err(error) => {
            error!("unable to connect to the database: {}",error);
            std::process::exit(1);
        }
    };
    let store: Arc<dyn TriggerStore> = match SurrealStore::new(db).await {
        Ok(store) => Arc::new(store),
        Err(error) => {
            error!("unable to prepare the trigger store: {}",error);
            std::process::exit(1);
        }
    };

    let (tx, rx) = unbounded::<Command>();
    info!("starting scheduler {}",config.machine_name);
    manager.scheduler(Scheduler::new(store, config, rx));

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, waiting for running jobs to finish");
                let _ = tx.send(Command::SchedulerGracefulShutdown);
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("second interrupt received, stopping now");
                    let _ = tx.send(Command::SchedulerForceShutdown);
                }
            }
            Err(error) => error!("unable to listen for interrupts: {}",error),
        }
    });

    manager.wait().await;
}
