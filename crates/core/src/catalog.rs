use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Dimensions, Product, ProductId, ProductSource};

/// 1 SAR in USD. Applied once while partner listings are normalized; the
/// query path never converts, so a rate change requires a reload.
pub fn partner_rate_to_usd() -> Decimal {
    Decimal::new(2667, 4)
}

/// Width window applied when a dimension target is given without an
/// explicit tolerance.
pub const DEFAULT_TOLERANCE_CM: f64 = 10.0;

/// Curated house-brand row, already priced in USD.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CuratedProduct {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub price_usd: Decimal,
    #[serde(default)]
    pub width_cm: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub depth_cm: Option<f64>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub color_options: Vec<String>,
    #[serde(default)]
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partner reference row, priced in SAR with its own field shape.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PartnerListing {
    pub item_id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price_sar: Option<Decimal>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default)]
    pub other_colors: Option<String>,
    #[serde(default)]
    pub sellable_online: Option<bool>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub designer: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub category: Option<String>,
    pub material: Option<String>,
    pub color: Option<String>,
    pub width_cm: Option<f64>,
    pub tolerance_cm: Option<f64>,
}

impl SearchQuery {
    /// Free-text constructor: splits on non-alphanumeric characters and
    /// lowercases, the same normalization the index applies at build time.
    pub fn from_text(text: &str) -> Self {
        Self { terms: tokenize(text), ..Self::default() }
    }
}

#[derive(Debug)]
struct IndexedProduct {
    product: Product,
    search_text: String,
}

/// Read-only merged view over both product sources. Built once at startup;
/// concurrent readers need no locking.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    entries: Vec<IndexedProduct>,
}

impl CatalogIndex {
    /// Normalizes both sources into one ordered sequence: house-brand rows
    /// first, then partner rows, each in input order. Partner prices are
    /// converted to USD here at the fixed rate, rounded to cents.
    pub fn build(curated: Vec<CuratedProduct>, partner: Vec<PartnerListing>) -> Self {
        let rate = partner_rate_to_usd();
        let mut entries = Vec::with_capacity(curated.len() + partner.len());

        for row in curated {
            entries.push(index_curated(row));
        }
        for row in partner {
            entries.push(index_partner(row, rate));
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_by_source(&self, source: ProductSource) -> usize {
        self.entries.iter().filter(|entry| entry.product.source == source).count()
    }

    /// Substring/range search over the merged catalog. Never fails; returns
    /// an empty sequence on no match. Ordering: closest width match first
    /// when a dimension target is present, ties broken by source priority
    /// (house-brand before partner-line), then by load order.
    pub fn search(&self, query: &SearchQuery) -> Vec<&Product> {
        let mut hits: Vec<(f64, u8, usize, &Product)> = Vec::new();

        for (position, entry) in self.entries.iter().enumerate() {
            let Some(width_distance) = self.match_entry(entry, query) else {
                continue;
            };
            hits.push((
                width_distance,
                entry.product.source.priority(),
                position,
                &entry.product,
            ));
        }

        hits.sort_by(|a, b| {
            a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)).then_with(|| a.2.cmp(&b.2))
        });
        hits.into_iter().map(|(_, _, _, product)| product).collect()
    }

    /// None = filtered out; Some(distance) = matched, with the width
    /// distance used as the primary sort key (0.0 when no target is given).
    fn match_entry(&self, entry: &IndexedProduct, query: &SearchQuery) -> Option<f64> {
        let product = &entry.product;

        for term in &query.terms {
            let id_match = product.id.0.eq_ignore_ascii_case(term);
            if !id_match && !entry.search_text.contains(term.as_str()) {
                return None;
            }
        }

        if let Some(category) = &query.category {
            if !product.category.eq_ignore_ascii_case(category.trim()) {
                return None;
            }
        }

        if let Some(material) = &query.material {
            let wanted = material.trim().to_ascii_lowercase();
            let found = product
                .material
                .as_ref()
                .is_some_and(|actual| actual.to_ascii_lowercase().contains(&wanted));
            if !found {
                return None;
            }
        }

        if let Some(color) = &query.color {
            let wanted = color.trim().to_ascii_lowercase();
            let found =
                product.colors.iter().any(|option| option.to_ascii_lowercase().contains(&wanted));
            if !found {
                return None;
            }
        }

        match query.width_cm {
            Some(target) => {
                let width = product.dimensions.width_cm?;
                let tolerance = query.tolerance_cm.unwrap_or(DEFAULT_TOLERANCE_CM).abs();
                let distance = (width - target).abs();
                (distance <= tolerance).then_some(distance)
            }
            None => Some(0.0),
        }
    }
}

fn index_curated(row: CuratedProduct) -> IndexedProduct {
    let search_text = build_search_text([
        Some(row.sku.as_str()),
        Some(row.name.as_str()),
        Some(row.category.as_str()),
        row.material.as_deref(),
        row.description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .chain(row.color_options.iter().map(String::as_str)));

    IndexedProduct {
        product: Product {
            id: ProductId(row.sku),
            name: row.name,
            category: row.category,
            source: ProductSource::HouseBrand,
            price_usd: Some(row.price_usd),
            dimensions: Dimensions {
                width_cm: row.width_cm,
                height_cm: row.height_cm,
                depth_cm: row.depth_cm,
            },
            material: row.material,
            colors: row.color_options,
            in_stock: row.in_stock,
            link: row.link,
            blurb: row.description,
        },
        search_text,
    }
}

fn index_partner(row: PartnerListing, rate: Decimal) -> IndexedProduct {
    let price_usd = row.price_sar.map(|sar| (sar * rate).round_dp(2));
    let colors = match row.other_colors.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() && !value.eq_ignore_ascii_case("no") => {
            vec![value.to_string()]
        }
        _ => Vec::new(),
    };

    let search_text = build_search_text(
        [
            Some(row.item_id.as_str()),
            Some(row.name.as_str()),
            Some(row.category.as_str()),
            row.short_description.as_deref(),
            row.designer.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(colors.iter().map(String::as_str)),
    );

    IndexedProduct {
        product: Product {
            id: ProductId(row.item_id),
            name: row.name,
            category: row.category,
            source: ProductSource::PartnerLine,
            price_usd,
            dimensions: Dimensions {
                width_cm: row.width,
                height_cm: row.height,
                depth_cm: row.depth,
            },
            material: None,
            colors,
            in_stock: row.sellable_online,
            link: row.link,
            blurb: row.short_description,
        },
        search_text,
    }
}

fn build_search_text<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let mut text = String::new();
    for field in fields {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&trimmed.to_ascii_lowercase());
    }
    text
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
        .collect()
}
