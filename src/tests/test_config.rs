#[cfg(test)]
mod test_config {
    use std::env;
    use std::path::PathBuf;
    use std::time::Duration;
    use tracing::Level;
    use crate::config::SchedulerConfig;
    use crate::database::{DbConnection, MEMORY_ADDRESS};

    const VARIABLES: [&str; 7] = [
        "TRIGGERD_MACHINE_NAME",
        "TRIGGERD_TICK_INTERVAL",
        "TRIGGERD_RUNTIME",
        "TRIGGERD_CHECKOUT_ROOT",
        "TRIGGERD_EXCLUSIVE",
        "TRIGGERD_LOG_LEVEL",
        "TRIGGERD_DB_ADDRESS",
    ];

    fn clear_env() {
        for name in VARIABLES {
            env::remove_var(name);
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_scheduler_config_from_env(){
        clear_env();
        env::set_var("TRIGGERD_MACHINE_NAME","worker-7");
        env::set_var("TRIGGERD_TICK_INTERVAL","2");
        env::set_var("TRIGGERD_RUNTIME","python3");
        env::set_var("TRIGGERD_CHECKOUT_ROOT","/var/tmp/triggerd");
        env::set_var("TRIGGERD_EXCLUSIVE","true");
        env::set_var("TRIGGERD_LOG_LEVEL","debug");
        let config: SchedulerConfig = SchedulerConfig::default();
        clear_env();

        assert_eq!(config.machine_name,"worker-7");
        assert_eq!(config.tick_interval,Duration::from_secs(2));
        assert_eq!(config.runtime,"python3");
        assert_eq!(config.process_extension,"py");
        assert_eq!(config.entry_point_name,"main.py");
        assert_eq!(config.checkout_root,PathBuf::from("/var/tmp/triggerd"));
        assert!(config.exclusive_mode);
        assert_eq!(config.log_level,Level::DEBUG);
    }

    #[test]
    #[serial_test::serial]
    fn test_scheduler_config_ignores_invalid_values(){
        clear_env();
        env::set_var("TRIGGERD_TICK_INTERVAL","soon");
        env::set_var("TRIGGERD_EXCLUSIVE","maybe");
        let config: SchedulerConfig = SchedulerConfig::default();
        clear_env();

        assert_eq!(config.tick_interval,Duration::from_secs(6));
        assert!(!config.exclusive_mode);
        assert_eq!(config.log_level,Level::INFO);
    }

    #[test]
    #[serial_test::serial]
    fn test_db_connection(){
        clear_env();
        env::set_var("TRIGGERD_DB_ADDRESS",MEMORY_ADDRESS);
        let config: DbConnection = DbConnection::default();
        clear_env();
        assert_eq!(config.address,MEMORY_ADDRESS);
        assert_eq!(config.namespace,"triggerd");

        let config: DbConnection = DbConnection::default();
        assert!(config.address.starts_with("ws://"),"{}",config.address);
    }

    #[test]
    #[serial_test::serial]
    fn test_default_checkout_roots_are_not_shared(){
        clear_env();
        env::set_var("TRIGGERD_MACHINE_NAME","worker-7");
        let first: SchedulerConfig = SchedulerConfig::default();
        let second: SchedulerConfig = SchedulerConfig::default();
        clear_env();

        let parent: PathBuf = env::temp_dir().join("triggerd_checkouts");
        assert_ne!(first.checkout_root,second.checkout_root);
        for config in [&first, &second] {
            assert_eq!(config.checkout_root.parent(),Some(parent.as_path()));
            let folder: String = config.checkout_root.file_name().unwrap().to_string_lossy().to_string();
            assert!(folder.starts_with("worker-7-"),"{}",folder);
        }
    }
}
