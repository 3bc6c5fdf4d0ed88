pub mod cli_args;
pub mod network_type;
pub mod secret_key;
