use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};
use tracing::debug;

use super::types::*;
use crate::error::SalesError;

/// One canonical column and the raw header names that map to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl SynonymGroup {
    fn new(canonical: &str, aliases: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Ordered synonym groups with a case-insensitive lookup.
///
/// The canonical name always counts as an alias of its own group, and when a
/// name appears in several groups the first group wins.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    groups: Vec<SynonymGroup>,
    lookup: HashMap<String, usize>,
}

static BUILTIN: Lazy<SynonymTable> = Lazy::new(|| {
    SynonymTable::build(vec![
        SynonymGroup::new(DATE, &["date"]),
        SynonymGroup::new(DAY, &["day"]),
        SynonymGroup::new(MONTH, &["month"]),
        SynonymGroup::new(YEAR, &["year"]),
        SynonymGroup::new(CUSTOMER_AGE, &["customer_age", "age"]),
        SynonymGroup::new(AGE_GROUP, &["age_group"]),
        SynonymGroup::new(CUSTOMER_GENDER, &["customer_gender", "gender"]),
        SynonymGroup::new(PRODUCT_CATEGORY, &["product_category", "category"]),
        SynonymGroup::new(SUB_CATEGORY, &["sub_category", "subcategory"]),
        SynonymGroup::new(PRODUCT, &["product", "product_name"]),
        SynonymGroup::new(ORDER_QUANTITY, &["order_quantity", "quantity", "order_qty"]),
        SynonymGroup::new(UNIT_COST, &["unit_cost", "cost_per_unit"]),
        SynonymGroup::new(UNIT_PRICE, &["unit_price", "price_per_unit"]),
        SynonymGroup::new(PROFIT, &["profit_total", "profit"]),
        SynonymGroup::new(COST, &["cost_total", "cost"]),
        SynonymGroup::new(REVENUE, &["revenue_total", "revenue"]),
        SynonymGroup::new(COUNTRY, &["country"]),
        SynonymGroup::new(STATE, &["state"]),
    ])
});

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl SynonymTable {
    /// Validate and index `groups`. Canonical names must be non-empty and unique.
    pub fn new(groups: Vec<SynonymGroup>) -> Result<Self, SalesError> {
        let mut seen = HashMap::new();
        for (i, g) in groups.iter().enumerate() {
            if g.canonical.trim().is_empty() {
                return Err(SalesError::Config(format!(
                    "synonym group {} has an empty canonical name",
                    i
                )));
            }
            if let Some(prev) = seen.insert(g.canonical.clone(), i) {
                return Err(SalesError::Config(format!(
                    "canonical name {:?} defined by groups {} and {}",
                    g.canonical, prev, i
                )));
            }
        }
        Ok(Self::build(groups))
    }

    fn build(groups: Vec<SynonymGroup>) -> Self {
        let mut lookup = HashMap::new();
        for (idx, g) in groups.iter().enumerate() {
            for name in std::iter::once(&g.canonical).chain(g.aliases.iter()) {
                lookup.entry(key(name)).or_insert(idx);
            }
        }
        Self { groups, lookup }
    }

    /// The default sales-column synonyms, built once.
    pub fn builtin() -> &'static SynonymTable {
        &BUILTIN
    }

    /// Parse a YAML list of `{canonical, aliases}` groups.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let groups: Vec<SynonymGroup> =
            serde_yaml::from_str(text).context("parsing synonym table")?;
        Ok(Self::new(groups)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading synonyms {:?}", path))?;
        let table = Self::from_yaml(&text).with_context(|| format!("loading synonyms {:?}", path))?;
        debug!(path = %path.display(), groups = table.groups.len(), "loaded synonym table");
        Ok(table)
    }

    /// The configured table when a path is given, otherwise the built-in one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::builtin().clone()),
        }
    }

    pub fn groups(&self) -> &[SynonymGroup] {
        &self.groups
    }

    /// Canonical name for a raw header, if any group claims it.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.lookup
            .get(&key(name))
            .map(|&i| self.groups[i].canonical.as_str())
    }

    /// Target name for every header, in order. Unmatched names pass through
    /// trimmed. The whole mapping is computed before anything is renamed.
    pub fn rename_plan(&self, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|h| match self.resolve(h) {
                Some(canonical) => canonical.to_string(),
                None => h.trim().to_string(),
            })
            .collect()
    }
}
