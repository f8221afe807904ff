use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::repair::{
    RepairEstimate, RepairRuleRecord, RuleResolution, SizeClass, TierBand, TierKind, TierQuote,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EstimateError {
    /// No rule covers the request through any fallback step. Surfaced to the
    /// caller as a distinguishable outcome so nobody gets quoted a guess.
    #[error("no repair rule covers issue `{issue}` (material {material:?}, size {size:?})")]
    NoRuleCoverage { issue: String, material: Option<String>, size: SizeClass },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct RuleTiers {
    budget: TierBand,
    standard: TierBand,
    rush: TierBand,
}

/// Nested lookup from issue -> material -> size. BTreeMap keying keeps the
/// any-material fallback scan order deterministic (lexicographic).
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: BTreeMap<String, BTreeMap<String, BTreeMap<SizeClass, RuleTiers>>>,
    entry_count: usize,
}

impl RuleTable {
    /// Later duplicates of the same (issue, material, size) key win, matching
    /// last-row-wins ingestion. Band consistency is NOT checked here; the
    /// estimator surfaces violations per request.
    pub fn from_records(records: Vec<RepairRuleRecord>) -> Self {
        let mut rules: BTreeMap<String, BTreeMap<String, BTreeMap<SizeClass, RuleTiers>>> =
            BTreeMap::new();
        let mut entry_count = 0;

        for record in records {
            let issue = record.issue.trim().to_ascii_lowercase();
            let material = record.material.trim().to_ascii_lowercase();
            let tiers = RuleTiers {
                budget: record.budget,
                standard: record.standard,
                rush: record.rush,
            };
            let replaced = rules
                .entry(issue)
                .or_default()
                .entry(material)
                .or_default()
                .insert(record.size, tiers);
            if replaced.is_none() {
                entry_count += 1;
            }
        }

        Self { rules, entry_count }
    }

    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn issues(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Resolution order, first success wins:
    /// 1. exact (issue, material, size);
    /// 2. same issue + material, nearest size (ties to the smaller size);
    /// 3. same issue, any material, exact size;
    /// 4. `NoRuleCoverage`.
    pub fn estimate(
        &self,
        issue: &str,
        material: Option<&str>,
        size: SizeClass,
    ) -> Result<RepairEstimate, EstimateError> {
        let issue_key = issue.trim().to_ascii_lowercase();
        let material_key = material.map(|value| value.trim().to_ascii_lowercase());

        let not_found = || EstimateError::NoRuleCoverage {
            issue: issue_key.clone(),
            material: material_key.clone(),
            size,
        };

        let by_material = self.rules.get(&issue_key).ok_or_else(|| not_found())?;

        if let Some(material_key) = &material_key {
            if let Some(by_size) = by_material.get(material_key) {
                if let Some(tiers) = by_size.get(&size) {
                    return Ok(assemble(
                        &issue_key,
                        Some(material_key.as_str()),
                        size,
                        RuleResolution::Exact,
                        tiers,
                    ));
                }
                if let Some((nearest, tiers)) = nearest_size(by_size, size) {
                    return Ok(assemble(
                        &issue_key,
                        Some(material_key.as_str()),
                        size,
                        RuleResolution::NearestSize { requested: size, matched: nearest },
                        tiers,
                    ));
                }
            }
        }

        // Material missing or unrecognized for this issue: first material
        // (sorted order) that covers the exact size.
        for (candidate, by_size) in by_material {
            if let Some(tiers) = by_size.get(&size) {
                return Ok(assemble(
                    &issue_key,
                    material_key.as_deref(),
                    size,
                    RuleResolution::AnyMaterial { matched: candidate.clone() },
                    tiers,
                ));
            }
        }

        Err(not_found())
    }
}

fn nearest_size(
    by_size: &BTreeMap<SizeClass, RuleTiers>,
    requested: SizeClass,
) -> Option<(SizeClass, &RuleTiers)> {
    SizeClass::ALL
        .iter()
        .filter_map(|candidate| by_size.get(candidate).map(|tiers| (*candidate, tiers)))
        .min_by_key(|(candidate, _)| {
            let distance = candidate.ordinal().abs_diff(requested.ordinal());
            // Smaller size wins an equal-distance tie.
            (distance, candidate.ordinal())
        })
}

fn assemble(
    issue: &str,
    material: Option<&str>,
    size: SizeClass,
    resolution: RuleResolution,
    tiers: &RuleTiers,
) -> RepairEstimate {
    let quotes = [
        TierQuote { kind: TierKind::Budget, price: tiers.budget.price(), duration: tiers.budget.duration() },
        TierQuote {
            kind: TierKind::Standard,
            price: tiers.standard.price(),
            duration: tiers.standard.duration(),
        },
        TierQuote { kind: TierKind::Rush, price: tiers.rush.price(), duration: tiers.rush.duration() },
    ];

    RepairEstimate {
        issue: issue.to_string(),
        material: material.map(str::to_string),
        size,
        resolution,
        anomalies: band_anomalies(&quotes),
        tiers: quotes,
    }
}

/// Names each violated relation without touching the bands themselves.
fn band_anomalies(quotes: &[TierQuote; 3]) -> Vec<String> {
    let mut anomalies = Vec::new();

    for quote in quotes {
        if quote.price.min > quote.price.max {
            anomalies.push(format!(
                "{} price band inverted: {} > {}",
                quote.kind.as_str(),
                quote.price.min,
                quote.price.max
            ));
        }
        if quote.duration.min_days > quote.duration.max_days {
            anomalies.push(format!(
                "{} duration band inverted: {} > {}",
                quote.kind.as_str(),
                quote.duration.min_days,
                quote.duration.max_days
            ));
        }
    }

    let [budget, standard, rush] = quotes;
    if budget.price.min > standard.price.min {
        anomalies.push(format!(
            "budget minimum {} exceeds standard minimum {}",
            budget.price.min, standard.price.min
        ));
    }
    if standard.price.min > rush.price.min {
        anomalies.push(format!(
            "standard minimum {} exceeds rush minimum {}",
            standard.price.min, rush.price.min
        ));
    }

    anomalies
}
