pub mod get;

pub use get::GetTaskError;
