pub mod audit_config;
pub mod cli_args;
pub mod database_config;
pub mod site_config;

pub use audit_config::*;
pub use cli_args::RunArgs;
pub use database_config::*;
pub use site_config::*;
