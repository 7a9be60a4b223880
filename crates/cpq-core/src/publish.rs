//! # Publish Validator
//!
//! Static authoring checks run before a template goes live. No selection is
//! involved; every finding is returned, not just the first.
//!
//! ## Checks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Template    base price not negative, at least one group                │
//! │  IDs         no duplicate group / option / rule IDs                     │
//! │  Groups      manual groups have options; limits are consistent          │
//! │  Options     modifier bounds                                            │
//! │  Rules       references exist; price tier bands make sense              │
//! │  auto_select no cycles (dry run, every condition assumed satisfiable)   │
//! │  Modifiers   no two `replace` options can be selected together          │
//! │  Presets     point at existing options of the right group               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::catalog::{
    Catalog, CatalogOption, ConfigurationRule, PriceModifier, RuleKind, RuleRef, SelectionType,
    SourceType,
};
use crate::rules::{dangling_references, dry_run_cycles};
use crate::validation::{validate_group_limits, validate_price_modifier, validate_price_tier};

// =============================================================================
// Publish Error
// =============================================================================

/// An authoring defect found by [`validate_for_publish`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishError {
    #[error("Template base price must not be negative")]
    NegativeBasePrice,

    #[error("Template has no option groups")]
    NoOptionGroups,

    #[error("Duplicate {entity} id: {id}")]
    DuplicateId { entity: String, id: String },

    #[error("Option group {group_id} has no options")]
    EmptyGroup { group_id: String },

    #[error("Option group {group_id} has invalid selection limits: {reason}")]
    InvalidGroupLimits { group_id: String, reason: String },

    #[error("Option {option_id} has an invalid price modifier: {reason}")]
    InvalidModifier { option_id: String, reason: String },

    #[error("Rule {rule_id} references unknown {reference}")]
    DanglingReference { rule_id: String, reference: String },

    #[error("Rule {rule_id} has an invalid price tier: {reason}")]
    InvalidPriceTier { rule_id: String, reason: String },

    /// `allowed_options` on a rule whose target is not a group, or naming an
    /// option outside the target group.
    #[error("Rule {rule_id} has invalid allowed options: {reason}")]
    InvalidAllowedOptions { rule_id: String, reason: String },

    /// auto_select rules that re-trigger or fight each other.
    #[error("auto_select rules form a cycle: {}", .rule_ids.join(", "))]
    RuleCycle { rule_ids: Vec<String> },

    /// Two `replace` options can be selected together.
    #[error("Options {first} and {second} both replace the base price and can be selected together")]
    ModifierConflict { first: String, second: String },

    #[error("Preset {preset_id} is invalid: {reason}")]
    InvalidPreset { preset_id: String, reason: String },
}

/// Outcome of [`validate_for_publish`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub valid: bool,
    pub errors: Vec<PublishError>,
}

// =============================================================================
// Validate
// =============================================================================

/// Runs every publish check.
///
/// ## Example
/// ```rust,ignore
/// let report = validate_for_publish(&catalog);
/// if !report.valid {
///     for error in &report.errors {
///         eprintln!("{error}");
///     }
/// }
/// ```
pub fn validate_for_publish(catalog: &Catalog) -> PublishReport {
    let mut errors = Vec::new();

    if catalog.template().base_price.is_negative() {
        errors.push(PublishError::NegativeBasePrice);
    }
    if catalog.groups().is_empty() {
        errors.push(PublishError::NoOptionGroups);
    }

    check_duplicate_ids(catalog, &mut errors);
    check_groups(catalog, &mut errors);
    check_rules(catalog, &mut errors);

    errors.extend(
        dry_run_cycles(catalog)
            .into_iter()
            .map(|cycle| PublishError::RuleCycle {
                rule_ids: cycle.rule_ids,
            }),
    );

    check_replace_conflicts(catalog, &mut errors);
    check_presets(catalog, &mut errors);

    PublishReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn check_duplicate_ids(catalog: &Catalog, errors: &mut Vec<PublishError>) {
    fn report<'a>(entity: &str, ids: impl Iterator<Item = &'a str>, errors: &mut Vec<PublishError>) {
        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        for id in ids {
            if !seen.insert(id) && reported.insert(id) {
                errors.push(PublishError::DuplicateId {
                    entity: entity.to_string(),
                    id: id.to_string(),
                });
            }
        }
    }

    report("group", catalog.groups().iter().map(|g| g.id.as_str()), errors);
    report(
        "option",
        catalog
            .groups()
            .iter()
            .flat_map(|g| g.options.iter().map(|o| o.id.as_str())),
        errors,
    );
    report("rule", catalog.rules().iter().map(|r| r.id.as_str()), errors);
}

fn check_groups(catalog: &Catalog, errors: &mut Vec<PublishError>) {
    for group in catalog.groups_by_id() {
        if group.source_type == SourceType::Manual && group.options.is_empty() {
            errors.push(PublishError::EmptyGroup {
                group_id: group.id.clone(),
            });
        }

        let mut limit_error = |reason: String| {
            errors.push(PublishError::InvalidGroupLimits {
                group_id: group.id.clone(),
                reason,
            })
        };
        if let Err(e) = validate_group_limits(group.min_selections, group.max_selections) {
            limit_error(e.to_string());
        }
        if group.is_single() && group.min_selections > 1 {
            limit_error("a single-select group cannot require more than one option".to_string());
        }
        if group.source_type == SourceType::Manual
            && !group.options.is_empty()
            && group.min_selections as usize > group.options.len()
        {
            limit_error(format!(
                "requires {} selections but has only {} options",
                group.min_selections,
                group.options.len()
            ));
        }

        for option in &group.options {
            if let Err(e) = validate_price_modifier(&option.price_modifier) {
                errors.push(PublishError::InvalidModifier {
                    option_id: option.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn check_rules(catalog: &Catalog, errors: &mut Vec<PublishError>) {
    let mut rules: Vec<_> = catalog.rules().iter().collect();
    rules.sort_by(|a, b| a.id.cmp(&b.id));

    for rule in rules {
        for reference in dangling_references(catalog, rule) {
            errors.push(PublishError::DanglingReference {
                rule_id: rule.id.clone(),
                reference,
            });
        }
        match &rule.kind {
            RuleKind::PriceTier { tier } => {
                if let Err(e) = validate_price_tier(tier) {
                    errors.push(PublishError::InvalidPriceTier {
                        rule_id: rule.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            RuleKind::Requires {
                target,
                allowed_options,
                ..
            } if !allowed_options.is_empty() => {
                check_allowed_options(catalog, rule, target, allowed_options, errors)
            }
            _ => {}
        }
    }
}

/// Unknown IDs are already reported as dangling references.
fn check_allowed_options(
    catalog: &Catalog,
    rule: &ConfigurationRule,
    target: &RuleRef,
    allowed_options: &[String],
    errors: &mut Vec<PublishError>,
) {
    let RuleRef::Group(group_id) = target else {
        errors.push(PublishError::InvalidAllowedOptions {
            rule_id: rule.id.clone(),
            reason: "target must be a group".to_string(),
        });
        return;
    };
    for option_id in allowed_options {
        match catalog.group_of_option(option_id) {
            Some(group) if group.id != *group_id => {
                errors.push(PublishError::InvalidAllowedOptions {
                    rule_id: rule.id.clone(),
                    reason: format!("option {} is not in group {}", option_id, group_id),
                })
            }
            _ => {}
        }
    }
}

/// Pairs of `replace` options that could be selected at the same time.
///
/// Two such options co-occur when they sit in different groups, or in the
/// same multiple-select group. An active `conflicts` rule between them (in
/// either direction) keeps them apart.
fn check_replace_conflicts(catalog: &Catalog, errors: &mut Vec<PublishError>) {
    let replacing: Vec<&CatalogOption> = catalog
        .options_by_id()
        .filter(|o| matches!(o.price_modifier, PriceModifier::Replace(_)))
        .collect();

    for (i, a) in replacing.iter().enumerate() {
        for b in replacing.iter().skip(i + 1) {
            let (Some(group_a), Some(group_b)) =
                (catalog.group_of_option(&a.id), catalog.group_of_option(&b.id))
            else {
                continue;
            };
            if group_a.id == group_b.id && group_a.is_single() {
                continue;
            }
            if separated_by_conflict(catalog, a, b) {
                continue;
            }
            errors.push(PublishError::ModifierConflict {
                first: a.id.clone(),
                second: b.id.clone(),
            });
        }
    }
}

fn separated_by_conflict(catalog: &Catalog, a: &CatalogOption, b: &CatalogOption) -> bool {
    let covers = |reference: &RuleRef, option: &CatalogOption| match reference {
        RuleRef::Option(id) => *id == option.id,
        RuleRef::Group(id) => catalog
            .group_of_option(&option.id)
            .map_or(false, |g| g.id == *id),
    };

    catalog.rules().iter().filter(|r| r.is_active).any(|rule| match &rule.kind {
        RuleKind::Conflicts { condition, target } => {
            (covers(condition, a) && covers(target, b)) || (covers(condition, b) && covers(target, a))
        }
        _ => false,
    })
}

fn check_presets(catalog: &Catalog, errors: &mut Vec<PublishError>) {
    for preset in catalog.presets() {
        let mut invalid = |reason: String| {
            errors.push(PublishError::InvalidPreset {
                preset_id: preset.id.clone(),
                reason,
            })
        };

        for (group_id, option_ids) in &preset.selections {
            let Some(group) = catalog.group(group_id) else {
                invalid(format!("unknown group {}", group_id));
                continue;
            };
            if group.is_single() && option_ids.len() > 1 {
                invalid(format!("selects {} options in single-select group {}", option_ids.len(), group_id));
            }
            if let (SelectionType::Multiple, Some(max)) = (group.selection_type, group.max_selections) {
                if option_ids.len() > max as usize {
                    invalid(format!("exceeds max selections of group {}", group_id));
                }
            }
            for option_id in option_ids {
                if !group.contains_option(option_id) {
                    invalid(format!("option {} is not in group {}", option_id, group_id));
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        DisplayMode, OptionGroup, PriceTier, Preset, Template, TemplateRecord, TierDiscount,
    };
    use crate::money::Money;
    use crate::types::Percent;
    use std::collections::BTreeMap;

    fn option(id: &str, group_id: &str, modifier: PriceModifier) -> CatalogOption {
        CatalogOption {
            id: id.to_string(),
            group_id: group_id.to_string(),
            name: id.to_string(),
            display_order: 0,
            price_modifier: modifier,
            is_default: false,
            is_available: true,
            product_id: None,
        }
    }

    fn group(id: &str, selection_type: SelectionType, options: Vec<CatalogOption>) -> OptionGroup {
        OptionGroup {
            id: id.to_string(),
            template_id: "t1".to_string(),
            name: id.to_string(),
            display_order: 0,
            selection_type,
            is_required: false,
            min_selections: 0,
            max_selections: None,
            source_type: SourceType::Manual,
            options,
        }
    }

    fn rule(id: &str, kind: RuleKind) -> ConfigurationRule {
        ConfigurationRule {
            id: id.to_string(),
            template_id: "t1".to_string(),
            name: id.to_string(),
            priority: 0,
            is_active: true,
            error_message: None,
            kind,
        }
    }

    fn record(groups: Vec<OptionGroup>, rules: Vec<ConfigurationRule>) -> TemplateRecord {
        TemplateRecord {
            template: Template {
                id: "t1".to_string(),
                name: "Laptop".to_string(),
                base_price: Money::from_major(1000),
                display_mode: DisplayMode::Wizard,
                is_active: false,
            },
            option_groups: groups,
            rules,
            presets: vec![],
        }
    }

    fn add() -> PriceModifier {
        PriceModifier::Add(Money::from_major(10))
    }

    fn replace() -> PriceModifier {
        PriceModifier::Replace(Money::from_major(500))
    }

    #[test]
    fn test_valid_catalog() {
        let catalog = Catalog::from_record(record(
            vec![group("cpu", SelectionType::Single, vec![option("i5", "cpu", add())])],
            vec![],
        ));
        let report = validate_for_publish(&catalog);
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn test_no_groups_and_negative_base() {
        let mut rec = record(vec![], vec![]);
        rec.template.base_price = Money::from_cents(-1);
        let report = validate_for_publish(&Catalog::from_record(rec));
        assert!(!report.valid);
        assert!(report.errors.contains(&PublishError::NoOptionGroups));
        assert!(report.errors.contains(&PublishError::NegativeBasePrice));
    }

    #[test]
    fn test_empty_group_unless_category() {
        let mut category = group("bags", SelectionType::Multiple, vec![]);
        category.source_type = SourceType::Category;
        let catalog = Catalog::from_record(record(
            vec![group("cpu", SelectionType::Single, vec![]), category],
            vec![],
        ));
        let report = validate_for_publish(&catalog);
        assert_eq!(
            report.errors,
            vec![PublishError::EmptyGroup {
                group_id: "cpu".to_string()
            }]
        );
    }

    #[test]
    fn test_dangling_reference_reported_for_inactive_rules_too() {
        let mut r = rule(
            "r1",
            RuleKind::Requires {
                condition: RuleRef::Option("i5".to_string()),
                target: RuleRef::Group("ghost".to_string()),
                allowed_options: Vec::new(),
            },
        );
        r.is_active = false;
        let catalog = Catalog::from_record(record(
            vec![group("cpu", SelectionType::Single, vec![option("i5", "cpu", add())])],
            vec![r],
        ));
        let report = validate_for_publish(&catalog);
        assert_eq!(
            report.errors,
            vec![PublishError::DanglingReference {
                rule_id: "r1".to_string(),
                reference: "group ghost".to_string(),
            }]
        );
    }

    #[test]
    fn test_allowed_options_must_sit_in_target_group() {
        let in_other_group = rule(
            "r1",
            RuleKind::Requires {
                condition: RuleRef::Option("i5".to_string()),
                target: RuleRef::Group("ram".to_string()),
                allowed_options: vec!["16gb".to_string(), "i7".to_string(), "ghost".to_string()],
            },
        );
        let option_target = rule(
            "r2",
            RuleKind::Requires {
                condition: RuleRef::Option("i5".to_string()),
                target: RuleRef::Option("16gb".to_string()),
                allowed_options: vec!["16gb".to_string()],
            },
        );
        let catalog = Catalog::from_record(record(
            vec![
                group(
                    "cpu",
                    SelectionType::Single,
                    vec![option("i5", "cpu", add()), option("i7", "cpu", add())],
                ),
                group("ram", SelectionType::Single, vec![option("16gb", "ram", add())]),
            ],
            vec![in_other_group, option_target],
        ));

        let report = validate_for_publish(&catalog);
        assert_eq!(
            report.errors,
            vec![
                PublishError::DanglingReference {
                    rule_id: "r1".to_string(),
                    reference: "option ghost".to_string(),
                },
                PublishError::InvalidAllowedOptions {
                    rule_id: "r1".to_string(),
                    reason: "option i7 is not in group ram".to_string(),
                },
                PublishError::InvalidAllowedOptions {
                    rule_id: "r2".to_string(),
                    reason: "target must be a group".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_replace_conflicts() {
        let catalog = Catalog::from_record(record(
            vec![
                group(
                    "edition",
                    SelectionType::Single,
                    vec![option("pro", "edition", replace()), option("home", "edition", replace())],
                ),
                group("bundle", SelectionType::Multiple, vec![option("edu", "bundle", replace())]),
            ],
            vec![],
        ));
        let report = validate_for_publish(&catalog);
        assert_eq!(
            report.errors,
            vec![
                PublishError::ModifierConflict {
                    first: "edu".to_string(),
                    second: "home".to_string()
                },
                PublishError::ModifierConflict {
                    first: "edu".to_string(),
                    second: "pro".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_conflicts_rule_separates_replace_options() {
        let catalog = Catalog::from_record(record(
            vec![
                group("edition", SelectionType::Single, vec![option("pro", "edition", replace())]),
                group("bundle", SelectionType::Multiple, vec![option("edu", "bundle", replace())]),
            ],
            vec![rule(
                "r1",
                RuleKind::Conflicts {
                    condition: RuleRef::Group("bundle".to_string()),
                    target: RuleRef::Option("pro".to_string()),
                },
            )],
        ));
        assert!(validate_for_publish(&catalog).valid);
    }

    #[test]
    fn test_auto_select_cycle() {
        let catalog = Catalog::from_record(record(
            vec![
                group("a", SelectionType::Multiple, vec![option("a1", "a", add())]),
                group("b", SelectionType::Multiple, vec![option("b1", "b", add())]),
            ],
            vec![
                rule(
                    "r1",
                    RuleKind::AutoSelect {
                        condition: RuleRef::Option("a1".to_string()),
                        option_id: "b1".to_string(),
                    },
                ),
                rule(
                    "r2",
                    RuleKind::AutoSelect {
                        condition: RuleRef::Option("b1".to_string()),
                        option_id: "a1".to_string(),
                    },
                ),
            ],
        ));
        let report = validate_for_publish(&catalog);
        assert_eq!(
            report.errors,
            vec![PublishError::RuleCycle {
                rule_ids: vec!["r1".to_string(), "r2".to_string()]
            }]
        );
        assert_eq!(
            report.errors[0].to_string(),
            "auto_select rules form a cycle: r1, r2"
        );
    }

    #[test]
    fn test_group_limits_and_tiers() {
        let mut bad_limits = group("ram", SelectionType::Multiple, vec![option("r8", "ram", add())]);
        bad_limits.min_selections = 3;
        bad_limits.max_selections = Some(2);

        let catalog = Catalog::from_record(record(
            vec![bad_limits],
            vec![rule(
                "tier",
                RuleKind::PriceTier {
                    tier: PriceTier {
                        quantity_min: 10,
                        quantity_max: Some(5),
                        discount: TierDiscount::Percentage(Percent::from_whole(5)),
                    },
                },
            )],
        ));
        let report = validate_for_publish(&catalog);
        let limits = report
            .errors
            .iter()
            .filter(|e| matches!(e, PublishError::InvalidGroupLimits { .. }))
            .count();
        assert_eq!(limits, 2);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, PublishError::InvalidPriceTier { rule_id, .. } if rule_id == "tier")));
    }

    #[test]
    fn test_presets_and_duplicates() {
        let mut rec = record(
            vec![
                group("cpu", SelectionType::Single, vec![option("i5", "cpu", add()), option("i7", "cpu", add())]),
                group("gpu", SelectionType::Single, vec![option("i5", "gpu", add())]),
            ],
            vec![],
        );
        let mut selections = BTreeMap::new();
        selections.insert("cpu".to_string(), vec!["i5".to_string(), "i7".to_string()]);
        selections.insert("disk".to_string(), vec!["ssd".to_string()]);
        rec.presets.push(Preset {
            id: "p1".to_string(),
            template_id: "t1".to_string(),
            name: "Max".to_string(),
            is_active: true,
            selections,
        });

        let report = validate_for_publish(&Catalog::from_record(rec));
        assert!(report.errors.contains(&PublishError::DuplicateId {
            entity: "option".to_string(),
            id: "i5".to_string(),
        }));
        let preset_errors = report
            .errors
            .iter()
            .filter(|e| matches!(e, PublishError::InvalidPreset { .. }))
            .count();
        assert_eq!(preset_errors, 2);
    }

    #[test]
    fn test_report_serializes_with_kind_tag() {
        let json = serde_json::to_value(PublishError::EmptyGroup {
            group_id: "cpu".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "empty_group");
        assert_eq!(json["group_id"], "cpu");
    }
}
