//! HTTP API handlers for rollcall

pub mod command;
pub mod health;
pub mod register;
pub mod ui;

pub use command::run_command;
pub use health::health_routes;
pub use register::{check_in, register_new};
pub use ui::serve_index;
