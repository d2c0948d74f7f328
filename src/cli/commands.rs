pub mod clear_sessions;
pub mod create_superuser;
pub mod evaluate;
pub mod initdb;
pub mod serve;

pub use clear_sessions::clear_sessions;
pub use create_superuser::create_superuser;
pub use evaluate::evaluate;
pub use initdb::init_database;
pub use serve::serve;
