//! SeaORM entity models
//!
//! Database entities for the SKU catalog

mod customer;
mod sku_variation;
mod standard_mapping;

pub use standard_mapping::{
    Entity as StandardMappingEntity,
    Model as StandardMapping,
    ActiveModel as StandardMappingActiveModel,
    Column as StandardMappingColumn,
};

pub use sku_variation::{
    Entity as SkuVariationEntity,
    Model as SkuVariation,
    ActiveModel as SkuVariationActiveModel,
    Column as SkuVariationColumn,
};

pub use customer::{
    Entity as CustomerEntity,
    Model as Customer,
    ActiveModel as CustomerActiveModel,
    Column as CustomerColumn,
};
