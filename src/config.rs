use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Settings of one scheduler instance.
///
/// Every field has an environment variable fallback read by [`Default`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Name this instance reports in heartbeats, jobs and whitelist checks.
    pub machine_name: String,
    /// Delay between two ticks of the scheduler loop.
    pub tick_interval: Duration,
    /// Program used to run entry points, e.g. `python`.
    pub runtime: String,
    /// Extension an entry point must carry, without the leading dot.
    pub process_extension: String,
    /// File name searched for inside git checkouts.
    pub entry_point_name: String,
    /// Root under which every git checkout gets its own folder. The whole root is
    /// wiped whenever the scheduler has no job left, so it must not be shared
    /// between instances.
    pub checkout_root: PathBuf,
    /// Store connection string handed to every child process.
    pub connection_string: String,
    /// Key handed to every child process for decrypting credentials.
    pub crypto_key: String,
    pub git_program: String,
    /// Start in exclusive mode, only claiming triggers whitelisted to this machine.
    pub exclusive_mode: bool,
    pub log_level: Level,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let machine_name: String = env::var("TRIGGERD_MACHINE_NAME")
            .or_else(|_| env::var("HOSTNAME"))
            .or_else(|_| env::var("COMPUTERNAME"))
            .unwrap_or("localhost".to_string());
        Self {
            tick_interval: Duration::from_secs(
                env::var("TRIGGERD_TICK_INTERVAL").ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(6)
            ),
            runtime: env::var("TRIGGERD_RUNTIME").unwrap_or("python".to_string()),
            process_extension: env::var("TRIGGERD_PROCESS_EXTENSION").unwrap_or("py".to_string()),
            entry_point_name: env::var("TRIGGERD_ENTRY_POINT").unwrap_or("main.py".to_string()),
            checkout_root: env::var("TRIGGERD_CHECKOUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_checkout_root(&machine_name)),
            connection_string: env::var("TRIGGERD_CONNECTION_STRING").unwrap_or(String::new()),
            crypto_key: env::var("TRIGGERD_CRYPTO_KEY").unwrap_or(String::new()),
            git_program: env::var("TRIGGERD_GIT").unwrap_or("git".to_string()),
            exclusive_mode: env::var("TRIGGERD_EXCLUSIVE").ok()
                .and_then(|value| value.parse::<bool>().ok())
                .unwrap_or(false),
            log_level: env::var("TRIGGERD_LOG_LEVEL").ok()
                .and_then(|value| value.parse::<Level>().ok())
                .unwrap_or(Level::INFO),
            machine_name,
        }
    }
}

/// A root of its own under `<tmp>/triggerd_checkouts`, so instances sharing a
/// host never wipe each other's checkouts.
fn default_checkout_root(machine_name: &str) -> PathBuf {
    env::temp_dir()
        .join("triggerd_checkouts")
        .join(format!("{}-{}",machine_name,uuid::Uuid::new_v4()))
}
