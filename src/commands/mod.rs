mod down;
mod prune;
mod status;
mod up;

pub use down::run_down;
pub use prune::run_prune;
pub use status::run_status;
pub use up::run_up;
