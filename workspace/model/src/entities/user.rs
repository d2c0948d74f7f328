use sea_orm::entity::prelude::*;

/// A registered account.
///
/// `password_hash` is an opaque PHC string owned by the identity layer; nothing
/// in the model crate interprets it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    /// Staff users may open the admin dashboard.
    #[sea_orm(default_value = "false")]
    pub is_staff: bool,
    /// Superusers can never be deleted from the admin dashboard.
    #[sea_orm(default_value = "false")]
    pub is_superuser: bool,
    pub date_joined: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::upload_record::Entity")]
    UploadRecord,
    #[sea_orm(has_many = "super::session::Entity")]
    Session,
}

impl Related<super::upload_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadRecord.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
