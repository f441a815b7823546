pub mod billing_cmd;
pub mod config_cmd;
pub mod output;
pub mod renderer;
pub mod serve_cmd;
