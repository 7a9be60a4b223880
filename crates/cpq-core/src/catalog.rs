//! # Catalog Model
//!
//! In-memory representation of one configurable Template: its option groups,
//! options, configuration rules and presets.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Template (base price, display mode)                                    │
//! │   ├── OptionGroup "Engine"  (single, required)                          │
//! │   │     ├── Option "V6"     add +2000.00                                │
//! │   │     └── Option "V8"     add +5000.00                                │
//! │   ├── OptionGroup "Add-ons" (multiple, max 3)                           │
//! │   │     └── ...                                                         │
//! │   ├── ConfigurationRule     requires / conflicts / hides /              │
//! │   │                         auto_select / price_tier                    │
//! │   └── Preset                saved selections ("Sport package")          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Catalog`] is built once per configuration session from a
//! [`TemplateRecord`] fetched by the catalog collaborator. Lookups go through
//! ordered indexes so evaluation never depends on the authored order of
//! groups or options; `display_order` exists for the UI only.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Multiplier, Percent};

fn default_true() -> bool {
    true
}

// =============================================================================
// Template
// =============================================================================

/// How the configurator UI walks the groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    SinglePage,
    Wizard,
}

/// The root configurable product definition.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Price before any option modifier (non-negative).
    pub base_price: Money,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default)]
    pub is_active: bool,
}

// =============================================================================
// Option Groups & Options
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SelectionType {
    Single,
    Multiple,
}

/// Where a group's options come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Options authored by hand.
    #[default]
    Manual,
    /// Options populated from a product category at load time.
    Category,
}

/// How an option changes the configured unit price.
///
/// ## Application Order
/// ```text
/// replace ──► add ──► multiply        (fixed, not commutative)
///
/// base 100, add +10, multiply ×2  ──►  (100 + 10) × 2 = 220
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum PriceModifier {
    /// Added to the running price; may be negative (a credit).
    Add(Money),
    /// Multiplies the price after all additions.
    Multiply(Multiplier),
    /// Overrides the template base price; zero is a valid free override.
    Replace(Money),
}

impl Default for PriceModifier {
    fn default() -> Self {
        PriceModifier::Add(Money::zero())
    }
}

/// One concrete choice inside a group.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogOption {
    pub id: String,
    pub group_id: String,
    pub name: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub price_modifier: PriceModifier,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
    /// Linked catalog product (category-sourced groups always set it).
    #[serde(default)]
    pub product_id: Option<String>,
}

/// A named category of choices within a template (e.g. "Color").
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OptionGroup {
    pub id: String,
    pub template_id: String,
    pub name: String,
    #[serde(default)]
    pub display_order: i32,
    pub selection_type: SelectionType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub min_selections: u32,
    #[serde(default)]
    pub max_selections: Option<u32>,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub options: Vec<CatalogOption>,
}

impl OptionGroup {
    /// Upper bound on selections, folding in the single-select rule.
    pub fn effective_max(&self) -> Option<u32> {
        match self.selection_type {
            SelectionType::Single => Some(self.max_selections.map_or(1, |max| max.min(1))),
            SelectionType::Multiple => self.max_selections,
        }
    }

    #[inline]
    pub fn is_single(&self) -> bool {
        self.selection_type == SelectionType::Single
    }

    /// Option IDs of this group in ID order.
    pub fn option_ids(&self) -> BTreeSet<&str> {
        self.options.iter().map(|o| o.id.as_str()).collect()
    }

    pub fn contains_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

// =============================================================================
// Configuration Rules
// =============================================================================

/// A rule's condition or action target: one option, or a whole group.
///
/// As a condition, `Group` means "any option in the group is selected".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RuleRef {
    Option(String),
    Group(String),
}

impl RuleRef {
    pub fn id(&self) -> &str {
        match self {
            RuleRef::Option(id) | RuleRef::Group(id) => id,
        }
    }
}

/// Discount granted by a price tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TierDiscount {
    /// Percentage off the configured unit price.
    Percentage(Percent),
    /// Fixed amount off the configured unit price.
    FixedAmount(Money),
}

/// Quantity band for a `price_tier` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceTier {
    pub quantity_min: i64,
    #[serde(default)]
    pub quantity_max: Option<i64>,
    pub discount: TierDiscount,
}

impl PriceTier {
    pub fn applies_to(&self, quantity: i64) -> bool {
        quantity >= self.quantity_min && self.quantity_max.map_or(true, |max| quantity <= max)
    }
}

/// The closed set of rule behaviours.
///
/// Every consumer matches on this exhaustively, so adding a rule type is a
/// compile error everywhere it has to be handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
pub enum RuleKind {
    /// When `condition` holds, `target` must be selected too.
    ///
    /// With a group target and a non-empty `allowed_options`, the group must
    /// hold at least one of the listed options.
    Requires {
        condition: RuleRef,
        target: RuleRef,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        allowed_options: Vec<String>,
    },
    /// When `condition` holds, `target` must not be selected.
    Conflicts { condition: RuleRef, target: RuleRef },
    /// When `condition` holds, `target` is hidden from the UI.
    Hides { condition: RuleRef, target: RuleRef },
    /// When `condition` holds, `option_id` is selected automatically.
    AutoSelect { condition: RuleRef, option_id: String },
    /// Quantity-based discount on the configured price.
    PriceTier { tier: PriceTier },
}

/// Discriminant of [`RuleKind`], for partitioning and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Requires,
    Conflicts,
    Hides,
    AutoSelect,
    PriceTier,
}

impl RuleKind {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleKind::Requires { .. } => RuleType::Requires,
            RuleKind::Conflicts { .. } => RuleType::Conflicts,
            RuleKind::Hides { .. } => RuleType::Hides,
            RuleKind::AutoSelect { .. } => RuleType::AutoSelect,
            RuleKind::PriceTier { .. } => RuleType::PriceTier,
        }
    }

    /// The rule's condition; price tiers have none.
    pub fn condition(&self) -> Option<&RuleRef> {
        match self {
            RuleKind::Requires { condition, .. }
            | RuleKind::Conflicts { condition, .. }
            | RuleKind::Hides { condition, .. }
            | RuleKind::AutoSelect { condition, .. } => Some(condition),
            RuleKind::PriceTier { .. } => None,
        }
    }
}

/// A business-logic constraint or side effect between options and groups.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConfigurationRule {
    pub id: String,
    pub template_id: String,
    #[serde(default)]
    pub name: String,
    /// Lower evaluates first; ties are broken by `id`.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Shown when a `requires` / `conflicts` rule is violated.
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl ConfigurationRule {
    #[inline]
    pub fn rule_type(&self) -> RuleType {
        self.kind.rule_type()
    }
}

// =============================================================================
// Presets
// =============================================================================

/// A saved, named selection ("Sport package").
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Preset {
    pub id: String,
    pub template_id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Group ID → selected option IDs.
    #[serde(default)]
    pub selections: BTreeMap<String, Vec<String>>,
}

// =============================================================================
// Template Record (collaborator payload)
// =============================================================================

/// Everything the catalog collaborator returns for one template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub template: Template,
    #[serde(default)]
    pub option_groups: Vec<OptionGroup>,
    #[serde(default)]
    pub rules: Vec<ConfigurationRule>,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

// =============================================================================
// Catalog
// =============================================================================

/// Indexed, read-only view of a [`TemplateRecord`].
///
/// ## Invariants
/// - Built once per session; never mutated afterwards
/// - Indexes are ordered by ID, so iteration is independent of authored order
/// - Duplicate IDs keep the first occurrence; the publish validator reports them
#[derive(Debug, Clone)]
pub struct Catalog {
    template: Template,
    groups: Vec<OptionGroup>,
    rules: Vec<ConfigurationRule>,
    presets: Vec<Preset>,
    group_index: BTreeMap<String, usize>,
    option_index: BTreeMap<String, (usize, usize)>,
}

impl Catalog {
    /// Builds the catalog and its lookup indexes.
    pub fn from_record(record: TemplateRecord) -> Self {
        let mut group_index = BTreeMap::new();
        let mut option_index = BTreeMap::new();

        for (gi, group) in record.option_groups.iter().enumerate() {
            group_index.entry(group.id.clone()).or_insert(gi);
            for (oi, option) in group.options.iter().enumerate() {
                option_index.entry(option.id.clone()).or_insert((gi, oi));
            }
        }

        Catalog {
            template: record.template,
            groups: record.option_groups,
            rules: record.rules,
            presets: record.presets,
            group_index,
            option_index,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Groups in authored order (display only).
    pub fn groups(&self) -> &[OptionGroup] {
        &self.groups
    }

    /// Groups in ID order (evaluation order).
    pub fn groups_by_id(&self) -> impl Iterator<Item = &OptionGroup> {
        self.group_index.values().map(move |&gi| &self.groups[gi])
    }

    pub fn group(&self, group_id: &str) -> Option<&OptionGroup> {
        self.group_index.get(group_id).map(|&gi| &self.groups[gi])
    }

    pub fn option(&self, option_id: &str) -> Option<&CatalogOption> {
        self.option_index
            .get(option_id)
            .map(|&(gi, oi)| &self.groups[gi].options[oi])
    }

    /// The group an option belongs to, per the catalog (not the option's own
    /// `group_id` field, which the caller may have left stale).
    pub fn group_of_option(&self, option_id: &str) -> Option<&OptionGroup> {
        self.option_index
            .get(option_id)
            .map(|&(gi, _)| &self.groups[gi])
    }

    pub fn contains_group(&self, group_id: &str) -> bool {
        self.group_index.contains_key(group_id)
    }

    pub fn contains_option(&self, option_id: &str) -> bool {
        self.option_index.contains_key(option_id)
    }

    /// Every option in ID order.
    pub fn options_by_id(&self) -> impl Iterator<Item = &CatalogOption> {
        self.option_index
            .values()
            .map(move |&(gi, oi)| &self.groups[gi].options[oi])
    }

    pub fn rules(&self) -> &[ConfigurationRule] {
        &self.rules
    }

    /// Active rules of one type, sorted by `(priority, id)`.
    pub fn active_rules_of(&self, rule_type: RuleType) -> Vec<&ConfigurationRule> {
        let mut rules: Vec<&ConfigurationRule> = self
            .rules
            .iter()
            .filter(|r| r.is_active && r.rule_type() == rule_type)
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        rules
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn preset(&self, preset_id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == preset_id)
    }

    /// Human-readable label for a rule reference, used in default messages.
    pub fn describe(&self, reference: &RuleRef) -> String {
        match reference {
            RuleRef::Option(id) => match self.option(id) {
                Some(option) => format!("option '{}'", option.name),
                None => format!("option {}", id),
            },
            RuleRef::Group(id) => match self.group(id) {
                Some(group) => format!("group '{}'", group.name),
                None => format!("group {}", id),
            },
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, group_id: &str) -> CatalogOption {
        CatalogOption {
            id: id.to_string(),
            group_id: group_id.to_string(),
            name: id.to_uppercase(),
            display_order: 0,
            price_modifier: PriceModifier::default(),
            is_default: false,
            is_available: true,
            product_id: None,
        }
    }

    fn record() -> TemplateRecord {
        TemplateRecord {
            template: Template {
                id: "t1".to_string(),
                name: "Desk".to_string(),
                base_price: Money::from_major(100),
                display_mode: DisplayMode::SinglePage,
                is_active: true,
            },
            option_groups: vec![
                OptionGroup {
                    id: "size".to_string(),
                    template_id: "t1".to_string(),
                    name: "Size".to_string(),
                    display_order: 1,
                    selection_type: SelectionType::Single,
                    is_required: true,
                    min_selections: 0,
                    max_selections: None,
                    source_type: SourceType::Manual,
                    options: vec![option("large", "size"), option("small", "size")],
                },
                OptionGroup {
                    id: "extras".to_string(),
                    template_id: "t1".to_string(),
                    name: "Extras".to_string(),
                    display_order: 0,
                    selection_type: SelectionType::Multiple,
                    is_required: false,
                    min_selections: 0,
                    max_selections: Some(2),
                    source_type: SourceType::Manual,
                    options: vec![option("lamp", "extras")],
                },
            ],
            rules: vec![
                ConfigurationRule {
                    id: "r2".to_string(),
                    template_id: "t1".to_string(),
                    name: "b".to_string(),
                    priority: 1,
                    is_active: true,
                    error_message: None,
                    kind: RuleKind::Hides {
                        condition: RuleRef::Option("small".to_string()),
                        target: RuleRef::Option("lamp".to_string()),
                    },
                },
                ConfigurationRule {
                    id: "r1".to_string(),
                    template_id: "t1".to_string(),
                    name: "a".to_string(),
                    priority: 1,
                    is_active: true,
                    error_message: None,
                    kind: RuleKind::Hides {
                        condition: RuleRef::Option("large".to_string()),
                        target: RuleRef::Group("extras".to_string()),
                    },
                },
                ConfigurationRule {
                    id: "r0".to_string(),
                    template_id: "t1".to_string(),
                    name: "off".to_string(),
                    priority: 0,
                    is_active: false,
                    error_message: None,
                    kind: RuleKind::Hides {
                        condition: RuleRef::Option("large".to_string()),
                        target: RuleRef::Option("lamp".to_string()),
                    },
                },
            ],
            presets: vec![],
        }
    }

    #[test]
    fn test_indexes() {
        let catalog = Catalog::from_record(record());
        assert_eq!(catalog.group_of_option("lamp").unwrap().id, "extras");
        assert!(catalog.contains_group("size"));
        assert!(!catalog.contains_option("chair"));

        let ids: Vec<&str> = catalog.groups_by_id().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["extras", "size"]);
    }

    #[test]
    fn test_active_rules_sorted_by_priority_then_id() {
        let catalog = Catalog::from_record(record());
        let ids: Vec<&str> = catalog
            .active_rules_of(RuleType::Hides)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_effective_max() {
        let catalog = Catalog::from_record(record());
        assert_eq!(catalog.group("size").unwrap().effective_max(), Some(1));
        assert_eq!(catalog.group("extras").unwrap().effective_max(), Some(2));
    }

    #[test]
    fn test_rule_json_shape() {
        let json = r#"{
            "id": "r9",
            "template_id": "t1",
            "rule_type": "auto_select",
            "condition": { "option": "large" },
            "option_id": "lamp"
        }"#;
        let rule: ConfigurationRule = serde_json::from_str(json).unwrap();
        assert!(rule.is_active);
        assert_eq!(rule.rule_type(), RuleType::AutoSelect);
        assert_eq!(rule.kind.condition(), Some(&RuleRef::Option("large".to_string())));
    }

    #[test]
    fn test_modifier_json_shape() {
        let modifier: PriceModifier =
            serde_json::from_str(r#"{ "type": "multiply", "amount": 11000 }"#).unwrap();
        assert_eq!(
            modifier,
            PriceModifier::Multiply(Multiplier::from_ten_thousandths(11_000))
        );
    }

    #[test]
    fn test_price_tier_band() {
        let tier = PriceTier {
            quantity_min: 10,
            quantity_max: Some(49),
            discount: TierDiscount::Percentage(Percent::from_whole(5)),
        };
        assert!(!tier.applies_to(9));
        assert!(tier.applies_to(10));
        assert!(tier.applies_to(49));
        assert!(!tier.applies_to(50));
    }
}
