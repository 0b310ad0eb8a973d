use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SpendError};
use crate::models::{FALLBACK_CATEGORY, MISSING_CATEGORY};

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRule {
    pub name: String,
    /// Uppercased at load time.
    pub keywords: Vec<String>,
}

/// Ordered keyword table. Iteration order is the order categories appear in
/// the source document, and the first matching category wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMap {
    rules: Vec<CategoryRule>,
}

impl CategoryMap {
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Result<Self> {
        let mut rules: Vec<CategoryRule> = Vec::with_capacity(entries.len());
        for (name, keywords) in entries {
            if rules.iter().any(|r| r.name == name) {
                return Err(SpendError::CategoryMap(format!("duplicate category '{name}'")));
            }
            let keywords = keywords
                .into_iter()
                .map(|k| k.trim().to_uppercase())
                .filter(|k| !k.is_empty())
                .collect();
            rules.push(CategoryRule { name, keywords });
        }
        Ok(Self { rules })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawCategoryMap = serde_json::from_str(json)
            .map_err(|e| SpendError::CategoryMap(e.to_string()))?;
        Self::new(raw.0)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SpendError::CategoryMap(format!(
                "{} not found. Run `spendlens init` to create a starter map.",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Starter map written by `spendlens init`.
    pub fn default_map() -> Self {
        let entries: &[(&str, &[&str])] = &[
            ("Income", &["PAYROLL", "DIRECT DEP", "SALARY", "INTEREST PAYMENT"]),
            ("Housing", &["RENT", "MORTGAGE", "HOA"]),
            ("Groceries", &["WHOLE FOODS", "TRADER JOE", "SAFEWAY", "KROGER", "ALDI"]),
            ("Coffee", &["STARBUCKS", "DUNKIN", "PEET"]),
            ("Dining", &["RESTAURANT", "DOORDASH", "UBER EATS", "GRUBHUB", "CHIPOTLE"]),
            ("Transport", &["UBER", "LYFT", "SHELL", "CHEVRON", "PARKING"]),
            ("Utilities", &["ELECTRIC", "WATER", "COMCAST", "VERIZON", "AT&T"]),
            ("Subscriptions", &["NETFLIX", "SPOTIFY", "HULU", "APPLE.COM"]),
            ("Shopping", &["AMAZON", "TARGET", "WALMART", "COSTCO"]),
            ("Transfers", &["TRANSFER", "ZELLE", "VENMO"]),
        ];
        let rules = entries
            .iter()
            .map(|(name, keywords)| CategoryRule {
                name: name.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for CategoryMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            map.serialize_entry(&rule.name, &rule.keywords)?;
        }
        map.end()
    }
}

/// Entries in document order, duplicates kept so `CategoryMap::new` can reject them.
struct RawCategoryMap(Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for RawCategoryMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = RawCategoryMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping category names to keyword arrays")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, keywords)) = access.next_entry::<String, Vec<String>>()? {
                    entries.push((name, keywords));
                }
                Ok(RawCategoryMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Map a description to a category label. First matching category wins,
/// in configured order; keywords are literal substrings of the uppercased
/// description.
pub fn assign_category<'a>(description: Option<&str>, map: &'a CategoryMap) -> &'a str {
    let Some(description) = description else {
        return MISSING_CATEGORY;
    };
    let desc_upper = description.to_uppercase();
    for rule in &map.rules {
        if rule.keywords.iter().any(|k| desc_upper.contains(k.as_str())) {
            return &rule.name;
        }
    }
    FALLBACK_CATEGORY
}
