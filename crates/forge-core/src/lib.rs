pub mod actions;
pub mod config;
pub mod error;
pub mod log_stream;
pub mod mutation;
pub mod path_key;
pub mod pipeline;
pub mod reducer;
pub mod state;
pub mod store;
pub mod tabs;
pub mod timeline;
pub mod tree;

pub use actions::*;
pub use reducer::*;
pub use state::*;

pub use config::Config;
pub use error::WorkspaceError;
pub use store::WorkspaceStore;
