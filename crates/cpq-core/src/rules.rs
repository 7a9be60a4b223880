//! # Rule Evaluator
//!
//! Evaluates a template's configuration rules against a selection.
//!
//! ## Evaluation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       evaluate(catalog, selection)                      │
//! │                                                                         │
//! │  0. reference check      dangling rule refs ──► Err(DanglingReference)  │
//! │           │                                                             │
//! │  1. auto_select          fixed point; forced options join selection     │
//! │           │              cyclic rules excluded, reported as RuleCycle   │
//! │           ▼                                                             │
//! │  2. requires             missing target ──► MISSING_REQUIRED            │
//! │  3. conflicts            present target ──► CONFLICT, target blocked    │
//! │  4. hides                target hidden; selected ──► HIDDEN_BUT_SELECTED│
//! │  5. group constraints    required / min ──► GROUP_INCOMPLETE            │
//! │                          max ──► GROUP_LIMIT_EXCEEDED                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  EvaluationResult { selection, violations, hidden, blocked, cycles }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Within each step rules run in `(priority, id)` order. Nothing depends on
//! the authored order of groups, options or rules, so the same catalog and
//! selection always produce the same result.
//!
//! Violations are data. Only programmer errors (a selection that does not
//! match the catalog, or a rule pointing at nothing) are returned as `Err`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use ts_rs::TS;

use crate::catalog::{Catalog, ConfigurationRule, RuleKind, RuleRef, RuleType};
use crate::error::{CoreError, CoreResult};
use crate::selection::Selection;

// =============================================================================
// Result Types
// =============================================================================

/// Category of a rule or group violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    MissingRequired,
    Conflict,
    HiddenButSelected,
    GroupIncomplete,
    GroupLimitExceeded,
}

/// A user-facing problem with the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Set for rule violations; `None` for group constraints.
    pub rule_id: Option<String>,
    pub group_id: Option<String>,
    pub option_id: Option<String>,
    pub message: String,
}

/// An option the evaluator selected on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ForcedSelection {
    pub rule_id: String,
    pub group_id: String,
    pub option_id: String,
}

/// A set of `auto_select` rules that keep re-triggering each other or fight
/// over the same single-select group. None of them is applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RuleCycle {
    /// Sorted, at least two entries.
    pub rule_ids: Vec<String>,
}

impl RuleCycle {
    fn new<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut rule_ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
        rule_ids.sort();
        rule_ids.dedup();
        RuleCycle { rule_ids }
    }

    pub fn involves(&self, rule_id: &str) -> bool {
        self.rule_ids.iter().any(|id| id == rule_id)
    }
}

impl fmt::Display for RuleCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "auto_select rules form a cycle: {}", self.rule_ids.join(", "))
    }
}

/// Everything the UI needs after a selection change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EvaluationResult {
    /// The user's selection plus every forced option.
    pub selection: Selection,
    pub forced_selections: Vec<ForcedSelection>,
    /// Targets of satisfied `conflicts` rules (rendered disabled).
    pub blocked_option_ids: BTreeSet<String>,
    /// Options hidden by a satisfied `hides` rule, including every option of
    /// a hidden group.
    pub hidden_option_ids: BTreeSet<String>,
    pub hidden_group_ids: BTreeSet<String>,
    pub violations: Vec<Violation>,
    pub cycles: Vec<RuleCycle>,
}

impl EvaluationResult {
    /// True when there is nothing blocking the configuration.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    pub fn is_hidden(&self, option_id: &str) -> bool {
        self.hidden_option_ids.contains(option_id)
    }

    pub fn is_blocked(&self, option_id: &str) -> bool {
        self.blocked_option_ids.contains(option_id)
    }
}

// =============================================================================
// Evaluate
// =============================================================================

/// Evaluates every active rule and group constraint.
///
/// ## Example
/// ```rust,ignore
/// let result = evaluate(&catalog, &selection)?;
/// if !result.is_valid() {
///     for v in &result.violations {
///         println!("{}", v.message);
///     }
/// }
/// ```
pub fn evaluate(catalog: &Catalog, selection: &Selection) -> CoreResult<EvaluationResult> {
    selection.validate_against(catalog)?;
    check_references(catalog)?;

    let auto_select = catalog.active_rules_of(RuleType::AutoSelect);
    let outcome = run_auto_select(catalog, &auto_select, selection);

    let mut eval = Evaluation {
        catalog,
        selection: &outcome.selection,
        blocked: BTreeSet::new(),
        hidden_options: BTreeSet::new(),
        hidden_groups: BTreeSet::new(),
        violations: Vec::new(),
    };

    for rule_type in [RuleType::Requires, RuleType::Conflicts, RuleType::Hides] {
        for rule in catalog.active_rules_of(rule_type) {
            eval.apply(rule);
        }
    }
    eval.report_hidden_selections();
    eval.check_group_constraints();

    let Evaluation {
        blocked,
        hidden_options,
        hidden_groups,
        violations,
        ..
    } = eval;

    Ok(EvaluationResult {
        selection: outcome.selection,
        forced_selections: outcome.forced,
        blocked_option_ids: blocked,
        hidden_option_ids: hidden_options,
        hidden_group_ids: hidden_groups,
        violations,
        cycles: outcome.cycles,
    })
}

/// Fails on the first active rule that points at an unknown group or option.
fn check_references(catalog: &Catalog) -> CoreResult<()> {
    for rule in catalog.rules().iter().filter(|r| r.is_active) {
        if let Some(reference) = dangling_references(catalog, rule).into_iter().next() {
            return Err(CoreError::DanglingReference {
                rule_id: rule.id.clone(),
                reference,
            });
        }
    }
    Ok(())
}

/// Every unknown reference in a rule, described as "option X" / "group Y".
pub(crate) fn dangling_references(catalog: &Catalog, rule: &ConfigurationRule) -> Vec<String> {
    let mut refs: Vec<RuleRef> = Vec::new();
    match &rule.kind {
        RuleKind::Requires {
            condition,
            target,
            allowed_options,
        } => {
            refs.push(condition.clone());
            refs.push(target.clone());
            refs.extend(allowed_options.iter().cloned().map(RuleRef::Option));
        }
        RuleKind::Conflicts { condition, target } | RuleKind::Hides { condition, target } => {
            refs.push(condition.clone());
            refs.push(target.clone());
        }
        RuleKind::AutoSelect {
            condition,
            option_id,
        } => {
            refs.push(condition.clone());
            refs.push(RuleRef::Option(option_id.clone()));
        }
        RuleKind::PriceTier { .. } => {}
    }

    refs.into_iter()
        .filter(|r| match r {
            RuleRef::Option(id) => !catalog.contains_option(id),
            RuleRef::Group(id) => !catalog.contains_group(id),
        })
        .map(|r| match r {
            RuleRef::Option(id) => format!("option {}", id),
            RuleRef::Group(id) => format!("group {}", id),
        })
        .collect()
}

// =============================================================================
// Condition & Target Helpers
// =============================================================================

fn condition_met(selection: &Selection, condition: &RuleRef) -> bool {
    match condition {
        RuleRef::Option(id) => selection.contains_option(id),
        RuleRef::Group(id) => selection.has_any_in_group(id),
    }
}

/// Option IDs a target covers, in ID order.
fn target_options<'c>(catalog: &'c Catalog, target: &'c RuleRef) -> Vec<&'c str> {
    match target {
        RuleRef::Option(id) => vec![id.as_str()],
        RuleRef::Group(id) => catalog
            .group(id)
            .map(|g| g.option_ids().into_iter().collect())
            .unwrap_or_default(),
    }
}

/// `error_message`, else the rule name, else a generated sentence.
fn rule_message(rule: &ConfigurationRule, fallback: impl FnOnce() -> String) -> String {
    match &rule.error_message {
        Some(message) if !message.trim().is_empty() => message.clone(),
        _ if !rule.name.trim().is_empty() => rule.name.clone(),
        _ => fallback(),
    }
}

// =============================================================================
// Constraint Rules (requires / conflicts / hides)
// =============================================================================

struct Evaluation<'a> {
    catalog: &'a Catalog,
    selection: &'a Selection,
    blocked: BTreeSet<String>,
    hidden_options: BTreeSet<String>,
    hidden_groups: BTreeSet<String>,
    violations: Vec<Violation>,
}

impl<'a> Evaluation<'a> {
    /// Applies one constraint rule. The match is exhaustive on purpose:
    /// a new rule type has to be placed in the pipeline before it compiles.
    fn apply(&mut self, rule: &ConfigurationRule) {
        match &rule.kind {
            RuleKind::Requires {
                condition,
                target,
                allowed_options,
            } => self.requires(rule, condition, target, allowed_options),
            RuleKind::Conflicts { condition, target } => self.conflicts(rule, condition, target),
            RuleKind::Hides { condition, target } => self.hides(condition, target),
            // Handled by run_auto_select and pricing::configured_price.
            RuleKind::AutoSelect { .. } | RuleKind::PriceTier { .. } => {}
        }
    }

    fn requires(
        &mut self,
        rule: &ConfigurationRule,
        condition: &RuleRef,
        target: &RuleRef,
        allowed_options: &[String],
    ) {
        if !condition_met(self.selection, condition) {
            return;
        }

        let (satisfied, group_id, option_id) = match target {
            RuleRef::Option(id) => (
                self.selection.contains_option(id),
                self.catalog.group_of_option(id).map(|g| g.id.clone()),
                Some(id.clone()),
            ),
            RuleRef::Group(id) if allowed_options.is_empty() => {
                (self.selection.has_any_in_group(id), Some(id.clone()), None)
            }
            // The group has to hold one of the allowed options; the offending
            // pick is reported when there is one.
            RuleRef::Group(id) => {
                let selected = self.selection.group(id);
                let allowed = selected.map_or(false, |options| {
                    allowed_options.iter().any(|a| options.contains(a))
                });
                let offending = selected.and_then(|options| options.iter().next().cloned());
                (allowed, Some(id.clone()), offending)
            }
        };
        if satisfied {
            return;
        }

        let catalog = self.catalog;
        let message = rule_message(rule, || {
            format!(
                "Selecting {} requires {}",
                catalog.describe(condition),
                catalog.describe(target)
            )
        });
        self.violations.push(Violation {
            kind: ViolationKind::MissingRequired,
            rule_id: Some(rule.id.clone()),
            group_id,
            option_id,
            message,
        });
    }

    fn conflicts(&mut self, rule: &ConfigurationRule, condition: &RuleRef, target: &RuleRef) {
        if !condition_met(self.selection, condition) {
            return;
        }

        let catalog = self.catalog;
        for option_id in target_options(catalog, target) {
            // An option never conflicts with itself when the target is its own group.
            if matches!(condition, RuleRef::Option(id) if id == option_id) {
                continue;
            }
            self.blocked.insert(option_id.to_string());

            if self.selection.contains_option(option_id) {
                let message = rule_message(rule, || {
                    format!(
                        "{} conflicts with {}",
                        catalog.describe(condition),
                        catalog.describe(&RuleRef::Option(option_id.to_string()))
                    )
                });
                self.violations.push(Violation {
                    kind: ViolationKind::Conflict,
                    rule_id: Some(rule.id.clone()),
                    group_id: catalog.group_of_option(option_id).map(|g| g.id.clone()),
                    option_id: Some(option_id.to_string()),
                    message,
                });
            }
        }
    }

    fn hides(&mut self, condition: &RuleRef, target: &RuleRef) {
        if !condition_met(self.selection, condition) {
            return;
        }
        if let RuleRef::Group(id) = target {
            self.hidden_groups.insert(id.clone());
        }
        for option_id in target_options(self.catalog, target) {
            self.hidden_options.insert(option_id.to_string());
        }
    }

    /// One HIDDEN_BUT_SELECTED per hidden option that is still selected.
    fn report_hidden_selections(&mut self) {
        for (group_id, option_id) in self.selection.iter() {
            if !self.hidden_options.contains(option_id) {
                continue;
            }
            let name = self
                .catalog
                .option(option_id)
                .map_or(option_id, |o| o.name.as_str());
            self.violations.push(Violation {
                kind: ViolationKind::HiddenButSelected,
                rule_id: None,
                group_id: Some(group_id.to_string()),
                option_id: Some(option_id.to_string()),
                message: format!("'{}' is no longer available with the current selection", name),
            });
        }
    }

    /// Required, minimum and maximum checks, per group in ID order.
    ///
    /// The minimum only applies once the group has a selection; an empty
    /// optional group is fine.
    fn check_group_constraints(&mut self) {
        for group in self.catalog.groups_by_id() {
            let count = self.selection.count(&group.id);

            if count == 0 && group.is_required {
                self.violations.push(Violation {
                    kind: ViolationKind::GroupIncomplete,
                    rule_id: None,
                    group_id: Some(group.id.clone()),
                    option_id: None,
                    message: format!("'{}' is required", group.name),
                });
            } else if count > 0 && count < group.min_selections as usize {
                self.violations.push(Violation {
                    kind: ViolationKind::GroupIncomplete,
                    rule_id: None,
                    group_id: Some(group.id.clone()),
                    option_id: None,
                    message: format!(
                        "Select at least {} option(s) in '{}'",
                        group.min_selections, group.name
                    ),
                });
            }

            if let Some(max) = group.effective_max() {
                if count > max as usize {
                    self.violations.push(Violation {
                        kind: ViolationKind::GroupLimitExceeded,
                        rule_id: None,
                        group_id: Some(group.id.clone()),
                        option_id: None,
                        message: format!(
                            "Select at most {} option(s) in '{}'",
                            max, group.name
                        ),
                    });
                }
            }
        }
    }
}

// =============================================================================
// auto_select
// =============================================================================

struct AutoSelectOutcome {
    selection: Selection,
    forced: Vec<ForcedSelection>,
    cycles: Vec<RuleCycle>,
}

/// Runs `auto_select` rules to a fixed point.
///
/// ## Termination
/// ```text
/// 1. Statically cyclic rules (dependency_cycles) are excluded up front.
/// 2. Each remaining rule fires at most once per pass.
/// 3. Two satisfied rules forcing different options into one single-select
///    group are contention: both are excluded and the pass restarts.
///
/// Every restart excludes at least two more rules, so there are at most
/// n/2 + 1 passes of at most n iterations each.
/// ```
fn run_auto_select(
    catalog: &Catalog,
    rules: &[&ConfigurationRule],
    start: &Selection,
) -> AutoSelectOutcome {
    let mut cycles = dependency_cycles(catalog, rules);
    let mut excluded: BTreeSet<&str> = BTreeSet::new();
    for cycle in &cycles {
        for rule in rules.iter().filter(|r| cycle.involves(&r.id)) {
            excluded.insert(rule.id.as_str());
        }
    }

    loop {
        match auto_select_pass(catalog, rules, start, &excluded) {
            Ok((selection, forced)) => {
                cycles.sort();
                return AutoSelectOutcome {
                    selection,
                    forced,
                    cycles,
                };
            }
            Err((first, second)) => {
                excluded.insert(first);
                excluded.insert(second);
                cycles.push(RuleCycle::new([first, second]));
            }
        }
    }
}

/// One fixed-point pass. Returns the contending rule pair on contention.
fn auto_select_pass<'r>(
    catalog: &Catalog,
    rules: &[&'r ConfigurationRule],
    start: &Selection,
    excluded: &BTreeSet<&str>,
) -> Result<(Selection, Vec<ForcedSelection>), (&'r str, &'r str)> {
    let mut selection = start.clone();
    let mut forced = Vec::new();
    let mut fired: BTreeSet<&str> = BTreeSet::new();
    // single-select group → (rule, option) that claimed it
    let mut claims: BTreeMap<&str, (&'r str, &'r str)> = BTreeMap::new();

    loop {
        let mut progressed = false;

        for &rule in rules {
            let RuleKind::AutoSelect {
                condition,
                option_id,
            } = &rule.kind
            else {
                continue;
            };
            if excluded.contains(rule.id.as_str()) || fired.contains(rule.id.as_str()) {
                continue;
            }
            if !condition_met(&selection, condition) {
                continue;
            }
            let Some(group) = catalog.group_of_option(option_id) else {
                continue;
            };

            if group.is_single() {
                if let Some(&(owner, claimed)) = claims.get(group.id.as_str()) {
                    if claimed != option_id {
                        return Err((owner, rule.id.as_str()));
                    }
                }
                claims.insert(group.id.as_str(), (rule.id.as_str(), option_id.as_str()));
                if !selection.contains(&group.id, option_id) {
                    selection.set_only(&group.id, option_id);
                    forced.push(forced_selection(rule, &group.id, option_id));
                }
            } else if !selection.contains(&group.id, option_id) {
                selection.insert(&group.id, option_id);
                forced.push(forced_selection(rule, &group.id, option_id));
            }

            fired.insert(rule.id.as_str());
            progressed = true;
        }

        if !progressed {
            return Ok((selection, forced));
        }
    }
}

fn forced_selection(rule: &ConfigurationRule, group_id: &str, option_id: &str) -> ForcedSelection {
    ForcedSelection {
        rule_id: rule.id.clone(),
        group_id: group_id.to_string(),
        option_id: option_id.to_string(),
    }
}

// =============================================================================
// Cycle Detection
// =============================================================================

/// Groups of `auto_select` rules that can re-trigger each other.
///
/// Rule A depends on rule B when A's forced option satisfies B's condition
/// (the option itself, or any option of its group). Rules that are mutually
/// reachable in that graph form a cycle. Self-loops are not cycles: a rule
/// whose forced option satisfies its own condition fires once and stops.
///
/// References to unknown options are ignored here; they are reported
/// separately.
pub(crate) fn dependency_cycles(catalog: &Catalog, rules: &[&ConfigurationRule]) -> Vec<RuleCycle> {
    let edges: Vec<Vec<usize>> = rules
        .iter()
        .map(|from| {
            let Some(forced) = forced_option(from) else {
                return Vec::new();
            };
            let forced_group = catalog.group_of_option(forced).map(|g| g.id.as_str());
            rules
                .iter()
                .enumerate()
                .filter(|(_, to)| to.id != from.id)
                .filter(|(_, to)| match to.kind.condition() {
                    Some(RuleRef::Option(id)) => id == forced,
                    Some(RuleRef::Group(id)) => forced_group == Some(id.as_str()),
                    None => false,
                })
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    let reach: Vec<BTreeSet<usize>> = (0..rules.len()).map(|i| reachable(&edges, i)).collect();

    let mut assigned = vec![false; rules.len()];
    let mut cycles = Vec::new();
    for i in 0..rules.len() {
        if assigned[i] {
            continue;
        }
        let members: Vec<usize> = (0..rules.len())
            .filter(|&j| j == i || (reach[i].contains(&j) && reach[j].contains(&i)))
            .collect();
        if members.len() < 2 {
            continue;
        }
        for &j in &members {
            assigned[j] = true;
        }
        cycles.push(RuleCycle::new(members.iter().map(|&j| rules[j].id.as_str())));
    }
    cycles
}

fn forced_option<'r>(rule: &'r ConfigurationRule) -> Option<&'r str> {
    match &rule.kind {
        RuleKind::AutoSelect { option_id, .. } => Some(option_id.as_str()),
        _ => None,
    }
}

/// Nodes reachable from `start` in one or more steps.
fn reachable(edges: &[Vec<usize>], start: usize) -> BTreeSet<usize> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<usize> = edges[start].clone();
    while let Some(node) = stack.pop() {
        if seen.insert(node) {
            stack.extend(edges[node].iter().copied());
        }
    }
    seen
}

/// Every `auto_select` cycle a catalog could produce, without a selection.
///
/// Dependency cycles plus static contention: two rules forcing different
/// options into the same single-select group whose conditions could hold at
/// the same time. Conditions can't co-occur when they are two different
/// options of one single-select group.
pub(crate) fn dry_run_cycles(catalog: &Catalog) -> Vec<RuleCycle> {
    let rules = catalog.active_rules_of(RuleType::AutoSelect);
    let mut cycles = dependency_cycles(catalog, &rules);

    for (i, a) in rules.iter().enumerate() {
        for b in rules.iter().skip(i + 1) {
            let (Some(option_a), Some(option_b)) = (forced_option(a), forced_option(b)) else {
                continue;
            };
            if option_a == option_b {
                continue;
            }
            let (Some(group_a), Some(group_b)) = (
                catalog.group_of_option(option_a),
                catalog.group_of_option(option_b),
            ) else {
                continue;
            };
            if group_a.id != group_b.id || !group_a.is_single() {
                continue;
            }
            if !conditions_compatible(catalog, a.kind.condition(), b.kind.condition()) {
                continue;
            }
            let cycle = RuleCycle::new([a.id.as_str(), b.id.as_str()]);
            if !cycles.contains(&cycle) {
                cycles.push(cycle);
            }
        }
    }

    cycles.sort();
    cycles
}

fn conditions_compatible(catalog: &Catalog, a: Option<&RuleRef>, b: Option<&RuleRef>) -> bool {
    let (Some(RuleRef::Option(x)), Some(RuleRef::Option(y))) = (a, b) else {
        return true;
    };
    if x == y {
        return true;
    }
    match (catalog.group_of_option(x), catalog.group_of_option(y)) {
        (Some(gx), Some(gy)) => !(gx.id == gy.id && gx.is_single()),
        _ => true,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
