//! Schema identifier to code identifier normalization.
//!
//! Normalization is a fixed pipeline:
//!
//! 1. split on non-alphanumeric characters and case transitions (digits never
//!    start a new word, so `2fa` stays one word);
//! 2. re-join in the requested [`IdentCase`];
//! 3. prefix `_` when the result does not start with a letter;
//! 4. on collision within a [`NameScope`], append the raw name as a single
//!    token, then a numeric disambiguator.

use convert_case::{Boundary, Case, Casing};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const RAW_SUFFIX_MAX: usize = 24;

/// Casing convention for generated identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentCase {
    UpperCamel,
    LowerCamel,
    Snake,
    ScreamingSnake,
}

impl IdentCase {
    fn case(self) -> Case {
        match self {
            IdentCase::UpperCamel => Case::Pascal,
            IdentCase::LowerCamel => Case::Camel,
            IdentCase::Snake => Case::Snake,
            IdentCase::ScreamingSnake => Case::ScreamingSnake,
        }
    }

    fn is_underscored(self) -> bool {
        matches!(self, IdentCase::Snake | IdentCase::ScreamingSnake)
    }
}

/// Naming conventions of one target ecosystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingPolicy {
    pub type_case: IdentCase,
    pub field_case: IdentCase,
    pub enum_case: IdentCase,
    /// Implicit identifier of the owning instance (`self`, `this`)
    pub instance_identifier: String,
    /// Field names that can never be generated
    pub reserved_fields: Vec<String>,
    /// Type names that can never be generated
    pub reserved_types: Vec<String>,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        NamingPolicy {
            type_case: IdentCase::UpperCamel,
            field_case: IdentCase::LowerCamel,
            enum_case: IdentCase::ScreamingSnake,
            instance_identifier: "self".to_string(),
            reserved_fields: Vec::new(),
            reserved_types: vec!["Self".to_string()],
        }
    }
}

impl NamingPolicy {
    pub fn type_name(&self, raw: &str) -> String {
        normalize(raw, self.type_case)
    }

    pub fn field_name(&self, raw: &str) -> String {
        normalize(raw, self.field_case)
    }

    /// Fresh scope for the fields of one table
    pub fn field_scope(&self) -> NameScope {
        let mut reserved = self.reserved_fields.clone();
        reserved.push(self.instance_identifier.clone());
        NameScope::new(self.field_case).with_reserved(reserved)
    }

    /// Fresh scope for the type names of one run.
    ///
    /// Type names become file names, so the scope ignores case and
    /// underscores when comparing.
    pub fn type_scope(&self) -> NameScope {
        NameScope::new(self.type_case)
            .folding()
            .with_reserved(self.reserved_types.clone())
    }
}

/// Normalize a raw schema identifier into `case`.
///
/// ```
/// use schemagen::metadata::naming::{normalize, IdentCase};
///
/// assert_eq!(normalize("order_items", IdentCase::UpperCamel), "OrderItems");
/// assert_eq!(normalize("parent_id", IdentCase::LowerCamel), "parentId");
/// assert_eq!(normalize("2fa_enabled", IdentCase::ScreamingSnake), "_2FA_ENABLED");
/// ```
pub fn normalize(raw: &str, case: IdentCase) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let joined = sanitized
        .with_boundaries(&[Boundary::Underscore, Boundary::LowerUpper, Boundary::Acronym])
        .to_case(case.case());

    if joined.is_empty() {
        return String::new();
    }
    if joined.starts_with(|c: char| c.is_ascii_alphabetic()) {
        joined
    } else {
        format!("_{}", joined)
    }
}

/// Raw name squeezed into one capitalized alphanumeric token
fn raw_token(raw: &str, case: IdentCase) -> String {
    let squeezed: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(RAW_SUFFIX_MAX)
        .collect::<String>()
        .to_lowercase();
    match case {
        IdentCase::ScreamingSnake => squeezed.to_uppercase(),
        IdentCase::Snake => squeezed,
        IdentCase::UpperCamel | IdentCase::LowerCamel => {
            let mut chars = squeezed.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        }
    }
}

/// Set of names already handed out in one scope
#[derive(Debug, Clone)]
pub struct NameScope {
    case: IdentCase,
    fold: bool,
    taken: HashSet<String>,
    reserved: HashSet<String>,
}

impl NameScope {
    pub fn new(case: IdentCase) -> Self {
        NameScope {
            case,
            fold: false,
            taken: HashSet::new(),
            reserved: HashSet::new(),
        }
    }

    /// Compare names ignoring ASCII case and underscores
    pub fn folding(mut self) -> Self {
        self.fold = true;
        self
    }

    pub fn with_reserved<I: IntoIterator<Item = String>>(mut self, reserved: I) -> Self {
        let keys: Vec<String> = reserved.into_iter().map(|r| self.key(&r)).collect();
        self.reserved.extend(keys);
        self
    }

    fn key(&self, name: &str) -> String {
        if self.fold {
            name.chars()
                .filter(|&c| c != '_')
                .map(|c| c.to_ascii_lowercase())
                .collect()
        } else {
            name.to_string()
        }
    }

    pub fn is_available(&self, name: &str) -> bool {
        let key = self.key(name);
        !name.is_empty() && !self.taken.contains(&key) && !self.reserved.contains(&key)
    }

    /// Claim `base`, falling back to `base + raw`, then `base + raw + n`.
    ///
    /// `base` is expected to be normalized already; `raw` is the source
    /// identifier it came from.
    pub fn claim(&mut self, base: &str, raw: &str) -> String {
        let base = if base.is_empty() { normalize("unnamed", self.case) } else { base.to_string() };
        if self.is_available(&base) {
            return self.take(base);
        }

        let token = raw_token(raw, self.case);
        let separator = if self.case.is_underscored() { "_" } else { "" };
        let with_raw = if token.is_empty() {
            base.clone()
        } else {
            format!("{}{}{}", base, separator, token)
        };
        if self.is_available(&with_raw) {
            return self.take(with_raw);
        }

        let mut n = 2usize;
        loop {
            let candidate = format!("{}{}", with_raw, n);
            if self.is_available(&candidate) {
                return self.take(candidate);
            }
            n += 1;
        }
    }

    fn take(&mut self, name: String) -> String {
        self.taken.insert(self.key(&name));
        name
    }
}
