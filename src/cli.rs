//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; the route table dispatches to the [`Atelier`](crate::api::Atelier) facade.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands, ConfigCommands};
pub use presentation::{format_events, format_resolution, format_status_report, format_task};
pub use route::{build_payload, RunContext};
