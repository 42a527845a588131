pub mod canonical;
pub mod models;

pub use canonical::canonicalize;
pub use models::*;
