pub mod allocator;

pub use allocator::{PortAllocator, PortResolution, is_self_identifying, probe_host};
