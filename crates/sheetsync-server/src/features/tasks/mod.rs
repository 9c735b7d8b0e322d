pub mod queries;
pub mod routes;

pub use queries::GetTaskError;
pub use routes::tasks_routes;
