pub mod heygen;
pub mod reconciler;
pub mod store;
pub mod submitter;

pub use heygen::*;
pub use reconciler::*;
pub use store::*;
pub use submitter::*;
