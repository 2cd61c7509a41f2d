pub mod router;

pub use router::{ModelClass, classify, route};
