pub mod backend;
pub mod contracts;
pub mod transport;

pub use backend::*;
pub use contracts::*;
pub use transport::*;
