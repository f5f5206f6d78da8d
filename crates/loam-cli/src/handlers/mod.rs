pub mod clean;
pub mod materialize;

pub use clean::CleanHandler;
pub use materialize::MaterializeHandler;
