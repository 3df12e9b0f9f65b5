//! Standard SKU mapping entity (the canonical catalog record)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "standard_sku_mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Canonical SKU, unique across the catalog (case-sensitive)
    #[sea_orm(column_type = "Text", unique)]
    pub standard_sku: String,

    #[sea_orm(column_type = "Text")]
    pub standard_description: String,

    pub created_at: DateTimeWithTimeZone,

    /// Refreshed on any field or variation-set mutation
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sku_variation::Entity")]
    Variations,
}

impl Related<super::sku_variation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
