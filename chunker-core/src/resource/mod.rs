pub mod probe;

pub use probe::{ResourceProbe, ResourceSnapshot};
