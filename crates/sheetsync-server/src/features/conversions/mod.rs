pub mod commands;
pub mod routes;

pub use commands::{
    ConvertCommand, ConvertError, ConvertResponse, DeleteCommand, DeleteError, DeleteResponse,
};
pub use routes::conversions_routes;
