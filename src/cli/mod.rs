pub mod args;
pub mod paths;
