use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSource {
    HouseBrand,
    PartnerLine,
}

impl ProductSource {
    /// House-brand items rank ahead of partner-line items when search
    /// scores tie.
    pub fn priority(self) -> u8 {
        match self {
            Self::HouseBrand => 0,
            Self::PartnerLine => 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub depth_cm: Option<f64>,
}

/// One normalized catalog entry. Prices are always USD after load-time
/// conversion; `source` tells the caller which dataset the item came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub source: ProductSource,
    pub price_usd: Option<Decimal>,
    pub dimensions: Dimensions,
    pub material: Option<String>,
    pub colors: Vec<String>,
    pub in_stock: Option<bool>,
    pub link: Option<String>,
    pub blurb: Option<String>,
}
