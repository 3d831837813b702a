mod assigner;
mod key;
mod registry;
mod state;

pub use assigner::WindowAssigner;
pub use key::WindowKey;
pub use registry::WindowRegistry;
pub use state::{WindowState, WindowStatus};
