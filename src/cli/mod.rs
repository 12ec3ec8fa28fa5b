//! Command-line interface: clap definitions in `parse`, dispatch in `route`.

pub mod parse;
pub mod route;

pub use parse::Cli;
pub use route::run;
