pub mod env_boot;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod tracing;

pub mod util {
    pub mod db;
    pub mod env;
}
