pub mod descriptor;

pub use descriptor::{BinField, PackageDescriptor, read_descriptor, try_read_descriptor};
