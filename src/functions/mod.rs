pub mod generate;
pub mod status;
pub mod sweeper;
pub mod videos;
pub mod webhook;

pub use generate::*;
pub use status::*;
pub use sweeper::*;
pub use videos::*;
pub use webhook::*;
