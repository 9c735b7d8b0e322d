pub mod convert;
pub mod delete;

pub use convert::{ConvertCommand, ConvertError, ConvertResponse};
pub use delete::{DeleteCommand, DeleteError, DeleteResponse};
