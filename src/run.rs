mod cli;
mod format;
mod serve;

pub(crate) use cli::as_cli;
