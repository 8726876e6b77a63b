pub mod db;
pub mod models;
pub mod mutations;
pub mod storage;

pub use models::RepositoryRecord;
pub use mutations::CreateRepositoryInput;
pub use storage::RepositoryStorage;
