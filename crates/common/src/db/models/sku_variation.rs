//! SKU variation entity: one customer's spelling of a standard SKU

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sku_variations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub mapping_id: i32,

    pub customer_id: i32,

    /// Raw SKU as supplied by the customer or source
    #[sea_orm(column_type = "Text")]
    pub variation_sku: String,

    /// Provenance label ("Customer Provided", "Email Import", ...)
    #[sea_orm(column_type = "Text")]
    pub source: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::standard_mapping::Entity",
        from = "Column::MappingId",
        to = "super::standard_mapping::Column::Id",
        on_delete = "Cascade"
    )]
    Mapping,

    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::standard_mapping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Mapping.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
