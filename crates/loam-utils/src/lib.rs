pub mod node_id;
pub mod path_utils;

pub use node_id::{display_name, package_key, short_name};
pub use path_utils::*;
