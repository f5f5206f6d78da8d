pub mod store;

pub use store::{PackageStore, sanitize_hash};
