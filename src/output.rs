use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::error::Error;

/// Number of `-v` flags given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Verbosity(u8);

impl Verbosity {
    pub fn new(count: u8) -> Self {
        Self(count)
    }

    /// A message declared at `level` is shown when verbosity is at least that level.
    pub fn allows(self, level: u8) -> bool {
        self.0 >= level
    }

    /// Level 0 maps to INFO, 1 to DEBUG, 2 to TRACE; 3 also lets dependencies trace.
    pub fn filter_directive(self) -> &'static str {
        match self.0 {
            0 => "stashbuild=info",
            1 => "stashbuild=debug",
            2 => "stashbuild=trace",
            _ => "trace",
        }
    }
}

/// `RUST_LOG` takes precedence over the `-v` count.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn render_error(err: &Error, verbosity: Verbosity) -> String {
    let mut out = format!("error: {:#}", err);
    if verbosity.allows(1) {
        out.push_str(&format!("\n{:?}", err));
    }
    out
}

/// Prints a fatal error and returns the exit code it carries.
pub fn report(err: &Error, verbosity: Verbosity) -> ExitCode {
    eprintln!("{}", render_error(err, verbosity));
    ExitCode::from(err.exit_code())
}
