use sea_orm::entity::prelude::*;

use super::user;
use crate::species::Species;

/// One successful image prediction made by an authenticated user.
/// Created once and never updated; removed only when its owner is deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "upload_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Owner of the upload.
    pub user_id: Option<i32>,
    /// Storage name of the image, relative to the media root.
    pub image: String,
    pub predicted_class: Species,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
