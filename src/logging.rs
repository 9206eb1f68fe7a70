//! Subscriber setup for the binary. Library code only emits `tracing` events.

use std::io::IsTerminal;
use tracing::Level;

/// Maps `-v` repetitions to a level: none is `warn`, then `info`, `debug`, `trace`.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs a formatting subscriber writing to stderr, keeping stdout for CSV output.
///
/// Calling it again is a no-op.
pub fn init(verbosity: u8) {
    let stderr = std::io::stderr();
    let _ = tracing_subscriber::fmt()
        .with_max_level(level_for(verbosity))
        .with_writer(std::io::stderr)
        .with_ansi(stderr.is_terminal())
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), Level::WARN);
        assert_eq!(level_for(1), Level::INFO);
        assert_eq!(level_for(2), Level::DEBUG);
        assert_eq!(level_for(9), Level::TRACE);
    }
}
