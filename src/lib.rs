pub mod cli;
pub mod core;
pub(crate) mod logging;
