pub mod catalog;
pub mod config;
pub mod domain;
pub mod logsink;
pub mod repair;

pub use catalog::{CatalogIndex, CuratedProduct, PartnerListing, SearchQuery};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::interaction::InteractionRecord;
pub use domain::product::{Dimensions, Product, ProductId, ProductSource};
pub use domain::repair::{
    DurationBand, PriceBand, RepairEstimate, RepairRuleRecord, RuleResolution, SizeClass, TierBand,
    TierKind, TierQuote,
};
pub use logsink::{InMemoryInteractionSink, InteractionSink, JsonlInteractionSink, SinkError};
pub use repair::{EstimateError, RuleTable};
