pub mod test_config;
pub mod test_supervisor;
pub mod test_scheduler;
