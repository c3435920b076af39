/// Abstraction over user-facing output.
///
/// Command modules write through this trait instead of `println!` so results
/// stay separate from the tracing logs on stderr.
pub trait UserOutput: Send + Sync {
    /// Informational status message (e.g., "Stopping all services...")
    fn status(&self, message: &str);

    /// Success message (e.g., "Environment is down")
    fn success(&self, message: &str);

    /// Warning message (e.g., "Network is still in use")
    fn warning(&self, message: &str);
}

/// Standard CLI output: results to stdout, warnings to stderr.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", message);
    }
}
