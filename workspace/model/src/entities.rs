//! Root of the SeaORM entity modules: accounts, the images they classified,
//! and the server-side sessions that authenticate them.

pub mod session;
pub mod upload_record;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::session::Entity as Session;
    pub use super::upload_record::Entity as UploadRecord;
    pub use super::user::Entity as User;
}
