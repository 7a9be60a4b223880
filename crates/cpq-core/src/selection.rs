//! # Selection State
//!
//! The per-session map of chosen options, and the mutations a configurator
//! UI performs on it.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Selection Lifecycle                                  │
//! │                                                                         │
//! │  SelectionState::new(catalog)                                          │
//! │       │                                                                 │
//! │       ├── apply_defaults()  (options flagged is_default)               │
//! │       ├── apply_preset(id)  (saved selection)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  select / deselect / replace_group   ◄── user clicks                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  snapshot() ──► rules::evaluate() ──► pricing::configured_price()      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations check catalog membership and group limits but never rules:
//! rules are reported as violations by the evaluator, not enforced here.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use ts_rs::TS;

use crate::catalog::{Catalog, OptionGroup};
use crate::error::{CoreError, CoreResult};

// =============================================================================
// Selection
// =============================================================================

/// Group ID → set of selected option IDs.
///
/// Groups with nothing selected are absent rather than mapped to an empty
/// set, so two selections with the same choices always compare equal.
/// Deserialization drops empty groups to keep that true for stored input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Selection {
    groups: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Deserialize)]
struct RawSelection {
    #[serde(default)]
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut raw = RawSelection::deserialize(deserializer)?;
        raw.groups.retain(|_, options| !options.is_empty());
        Ok(Selection { groups: raw.groups })
    }
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selection from raw pairs without checking a catalog.
    ///
    /// Use [`Selection::validate_against`] before trusting the result.
    pub fn from_pairs<I, G, O>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (G, O)>,
        G: Into<String>,
        O: Into<String>,
    {
        let mut selection = Selection::new();
        for (group_id, option_id) in pairs {
            let group_id: String = group_id.into();
            let option_id: String = option_id.into();
            selection.insert(&group_id, &option_id);
        }
        selection
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// True when the option is selected in any group.
    pub fn contains_option(&self, option_id: &str) -> bool {
        self.groups.values().any(|options| options.contains(option_id))
    }

    /// True when the option is selected in the given group.
    pub fn contains(&self, group_id: &str, option_id: &str) -> bool {
        self.groups
            .get(group_id)
            .map_or(false, |options| options.contains(option_id))
    }

    /// True when at least one option in the group is selected.
    pub fn has_any_in_group(&self, group_id: &str) -> bool {
        self.groups
            .get(group_id)
            .map_or(false, |options| !options.is_empty())
    }

    pub fn count(&self, group_id: &str) -> usize {
        self.groups.get(group_id).map_or(0, BTreeSet::len)
    }

    pub fn group(&self, group_id: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group_id)
    }

    /// `(group_id, option_id)` pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.groups.iter().flat_map(|(group_id, options)| {
            options
                .iter()
                .map(move |option_id| (group_id.as_str(), option_id.as_str()))
        })
    }

    /// Selected option IDs across all groups.
    pub fn option_ids(&self) -> BTreeSet<&str> {
        self.iter().map(|(_, option_id)| option_id).collect()
    }

    /// Total number of selected options.
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    // -------------------------------------------------------------------------
    // Raw mutations (no catalog checks)
    // -------------------------------------------------------------------------

    pub(crate) fn insert(&mut self, group_id: &str, option_id: &str) {
        self.groups
            .entry(group_id.to_string())
            .or_default()
            .insert(option_id.to_string());
    }

    pub(crate) fn remove(&mut self, group_id: &str, option_id: &str) -> bool {
        let Some(options) = self.groups.get_mut(group_id) else {
            return false;
        };
        let removed = options.remove(option_id);
        if options.is_empty() {
            self.groups.remove(group_id);
        }
        removed
    }

    /// Makes `option_id` the only selection in its group.
    pub(crate) fn set_only(&mut self, group_id: &str, option_id: &str) {
        let mut options = BTreeSet::new();
        options.insert(option_id.to_string());
        self.groups.insert(group_id.to_string(), options);
    }

    pub(crate) fn clear_group(&mut self, group_id: &str) {
        self.groups.remove(group_id);
    }

    // -------------------------------------------------------------------------
    // Catalog checks
    // -------------------------------------------------------------------------

    /// Checks that every group and option exists and each option sits in the
    /// group it is filed under.
    pub fn validate_against(&self, catalog: &Catalog) -> CoreResult<()> {
        for (group_id, option_id) in self.iter() {
            if !catalog.contains_group(group_id) {
                return Err(CoreError::UnknownGroup(group_id.to_string()));
            }
            match catalog.group_of_option(option_id) {
                None => return Err(CoreError::UnknownOption(option_id.to_string())),
                Some(group) if group.id != group_id => {
                    return Err(CoreError::OptionNotInGroup {
                        option_id: option_id.to_string(),
                        group_id: group_id.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

// =============================================================================
// Selection State
// =============================================================================

/// A selection bound to the catalog it was made against.
///
/// ## Example
/// ```rust,ignore
/// let mut state = SelectionState::new(catalog.clone());
/// state.apply_defaults();
/// state.select("color", "red")?;
/// let result = cpq_core::rules::evaluate(state.catalog(), state.selection())?;
/// ```
#[derive(Debug, Clone)]
pub struct SelectionState {
    catalog: Arc<Catalog>,
    selection: Selection,
}

impl SelectionState {
    /// Starts with an empty selection.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        SelectionState {
            catalog,
            selection: Selection::new(),
        }
    }

    /// Restores a previously saved selection.
    pub fn with_selection(catalog: Arc<Catalog>, selection: Selection) -> CoreResult<Self> {
        selection.validate_against(&catalog)?;
        Ok(SelectionState { catalog, selection })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_arc(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Immutable copy for evaluation and pricing.
    pub fn snapshot(&self) -> Selection {
        self.selection.clone()
    }

    /// Selects an option.
    ///
    /// ## Behavior
    /// - Single-select group: replaces whatever was selected
    /// - Multiple-select group at `max_selections`: rejected, state unchanged
    /// - Already selected: no-op
    pub fn select(&mut self, group_id: &str, option_id: &str) -> CoreResult<()> {
        let catalog = Arc::clone(&self.catalog);
        let group = checked_option(&catalog, group_id, option_id)?;

        if self.selection.contains(group_id, option_id) {
            return Ok(());
        }

        if group.is_single() {
            self.selection.set_only(group_id, option_id);
            return Ok(());
        }

        if let Some(max) = group.effective_max() {
            if self.selection.count(group_id) >= max as usize {
                return Err(CoreError::SelectionLimit {
                    group_id: group_id.to_string(),
                    max,
                });
            }
        }

        self.selection.insert(group_id, option_id);
        Ok(())
    }

    /// Deselects an option. Returns whether it was selected.
    pub fn deselect(&mut self, group_id: &str, option_id: &str) -> CoreResult<bool> {
        checked_group(&self.catalog, group_id)?;
        Ok(self.selection.remove(group_id, option_id))
    }

    /// Replaces a group's entire selection.
    ///
    /// Used by multi-select widgets that submit the whole set at once. An
    /// empty list clears the group.
    pub fn replace_group(&mut self, group_id: &str, option_ids: &[String]) -> CoreResult<()> {
        let catalog = Arc::clone(&self.catalog);
        let group = checked_group(&catalog, group_id)?;

        let wanted: BTreeSet<&str> = option_ids.iter().map(String::as_str).collect();
        if let Some(max) = group.effective_max() {
            if wanted.len() > max as usize {
                return Err(CoreError::SelectionLimit {
                    group_id: group_id.to_string(),
                    max,
                });
            }
        }
        for option_id in &wanted {
            checked_option(&catalog, group_id, option_id)?;
        }

        self.selection.clear_group(group_id);
        for option_id in wanted {
            self.selection.insert(group_id, option_id);
        }
        Ok(())
    }

    /// Clears a single group.
    pub fn clear_group(&mut self, group_id: &str) -> CoreResult<()> {
        checked_group(&self.catalog, group_id)?;
        self.selection.clear_group(group_id);
        Ok(())
    }

    /// Clears everything.
    pub fn clear(&mut self) {
        self.selection = Selection::new();
    }

    /// Pre-selects options flagged `is_default` in groups that are still empty.
    ///
    /// Single-select groups take the lowest-ID default; multiple-select groups
    /// take defaults in ID order up to `max_selections`. Unavailable options
    /// are skipped. Returns the number of options selected.
    pub fn apply_defaults(&mut self) -> usize {
        let catalog = Arc::clone(&self.catalog);
        let mut applied = 0;

        for group in catalog.groups_by_id() {
            if self.selection.has_any_in_group(&group.id) {
                continue;
            }

            let mut defaults: Vec<&str> = group
                .options
                .iter()
                .filter(|o| o.is_default && o.is_available)
                .map(|o| o.id.as_str())
                .collect();
            defaults.sort_unstable();

            let limit = group.effective_max().map_or(usize::MAX, |max| max as usize);
            for option_id in defaults.into_iter().take(limit) {
                self.selection.insert(&group.id, option_id);
                applied += 1;
            }
        }

        applied
    }

    /// Replaces the selection with a saved preset.
    ///
    /// The whole preset is checked before anything changes, so a bad preset
    /// leaves the current selection intact.
    pub fn apply_preset(&mut self, preset_id: &str) -> CoreResult<()> {
        let catalog = Arc::clone(&self.catalog);
        let preset = catalog
            .preset(preset_id)
            .ok_or_else(|| CoreError::UnknownPreset(preset_id.to_string()))?;
        if !preset.is_active {
            return Err(CoreError::PresetInactive(preset_id.to_string()));
        }

        let mut next = SelectionState::new(Arc::clone(&catalog));
        for (group_id, option_ids) in &preset.selections {
            next.replace_group(group_id, option_ids)?;
        }

        self.selection = next.selection;
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn checked_group<'c>(catalog: &'c Catalog, group_id: &str) -> CoreResult<&'c OptionGroup> {
    catalog
        .group(group_id)
        .ok_or_else(|| CoreError::UnknownGroup(group_id.to_string()))
}

fn checked_option<'c>(
    catalog: &'c Catalog,
    group_id: &str,
    option_id: &str,
) -> CoreResult<&'c OptionGroup> {
    let group = checked_group(catalog, group_id)?;
    let option = group
        .options
        .iter()
        .find(|o| o.id == option_id)
        .ok_or_else(|| {
            if catalog.contains_option(option_id) {
                CoreError::OptionNotInGroup {
                    option_id: option_id.to_string(),
                    group_id: group_id.to_string(),
                }
            } else {
                CoreError::UnknownOption(option_id.to_string())
            }
        })?;
    if !option.is_available {
        return Err(CoreError::OptionUnavailable(option_id.to_string()));
    }
    Ok(group)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        CatalogOption, DisplayMode, OptionGroup, Preset, PriceModifier, SelectionType,
        SourceType, Template, TemplateRecord,
    };
    use crate::money::Money;
    use assert_matches::assert_matches;

    fn option(id: &str, group_id: &str, is_default: bool) -> CatalogOption {
        CatalogOption {
            id: id.to_string(),
            group_id: group_id.to_string(),
            name: id.to_string(),
            display_order: 0,
            price_modifier: PriceModifier::default(),
            is_default,
            is_available: true,
            product_id: None,
        }
    }

    fn group(id: &str, selection_type: SelectionType, max: Option<u32>, options: Vec<CatalogOption>) -> OptionGroup {
        OptionGroup {
            id: id.to_string(),
            template_id: "t1".to_string(),
            name: id.to_string(),
            display_order: 0,
            selection_type,
            is_required: false,
            min_selections: 0,
            max_selections: max,
            source_type: SourceType::Manual,
            options,
        }
    }

    fn catalog() -> Arc<Catalog> {
        let mut unavailable = option("gold", "color", false);
        unavailable.is_available = false;

        let mut selections = BTreeMap::new();
        selections.insert("color".to_string(), vec!["blue".to_string()]);
        selections.insert("extras".to_string(), vec!["a".to_string(), "b".to_string()]);

        let mut inactive = Preset {
            id: "p-off".to_string(),
            template_id: "t1".to_string(),
            name: "Old".to_string(),
            is_active: false,
            selections: BTreeMap::new(),
        };
        inactive.selections.insert("color".to_string(), vec!["red".to_string()]);

        Arc::new(Catalog::from_record(TemplateRecord {
            template: Template {
                id: "t1".to_string(),
                name: "Chair".to_string(),
                base_price: Money::from_major(50),
                display_mode: DisplayMode::Wizard,
                is_active: true,
            },
            option_groups: vec![
                group(
                    "color",
                    SelectionType::Single,
                    None,
                    vec![option("red", "color", true), option("blue", "color", false), unavailable],
                ),
                group(
                    "extras",
                    SelectionType::Multiple,
                    Some(2),
                    vec![
                        option("c", "extras", true),
                        option("a", "extras", true),
                        option("b", "extras", true),
                    ],
                ),
            ],
            rules: vec![],
            presets: vec![
                Preset {
                    id: "p-sport".to_string(),
                    template_id: "t1".to_string(),
                    name: "Sport".to_string(),
                    is_active: true,
                    selections,
                },
                inactive,
            ],
        }))
    }

    #[test]
    fn test_single_select_replaces() {
        let mut state = SelectionState::new(catalog());
        state.select("color", "red").unwrap();
        state.select("color", "blue").unwrap();

        assert_eq!(state.selection().count("color"), 1);
        assert!(state.selection().contains("color", "blue"));
    }

    #[test]
    fn test_multiple_select_limit_leaves_state_unchanged() {
        let mut state = SelectionState::new(catalog());
        state.select("extras", "a").unwrap();
        state.select("extras", "b").unwrap();
        let before = state.snapshot();

        let result = state.select("extras", "c");
        assert_matches!(result, Err(CoreError::SelectionLimit { max: 2, .. }));
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_select_rejects_bad_ids() {
        let mut state = SelectionState::new(catalog());
        assert_matches!(state.select("size", "red"), Err(CoreError::UnknownGroup(_)));
        assert_matches!(state.select("color", "nope"), Err(CoreError::UnknownOption(_)));
        assert_matches!(
            state.select("color", "a"),
            Err(CoreError::OptionNotInGroup { .. })
        );
        assert_matches!(
            state.select("color", "gold"),
            Err(CoreError::OptionUnavailable(_))
        );
        assert!(state.selection().is_empty());
    }

    #[test]
    fn test_deselect_removes_empty_group() {
        let mut state = SelectionState::new(catalog());
        state.select("extras", "a").unwrap();
        assert!(state.deselect("extras", "a").unwrap());
        assert!(!state.deselect("extras", "a").unwrap());
        assert!(!state.selection().has_any_in_group("extras"));
        assert_eq!(state.snapshot(), Selection::new());
    }

    #[test]
    fn test_replace_group() {
        let mut state = SelectionState::new(catalog());
        state
            .replace_group("extras", &["a".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(state.selection().count("extras"), 2);

        let too_many = ["a".to_string(), "b".to_string(), "c".to_string()];
        assert_matches!(
            state.replace_group("extras", &too_many),
            Err(CoreError::SelectionLimit { .. })
        );
        assert!(state.selection().contains("extras", "c"));

        state.replace_group("extras", &[]).unwrap();
        assert!(!state.selection().has_any_in_group("extras"));
    }

    #[test]
    fn test_apply_defaults_respects_limits() {
        let mut state = SelectionState::new(catalog());
        let applied = state.apply_defaults();

        assert_eq!(applied, 3);
        assert!(state.selection().contains("color", "red"));
        assert!(state.selection().contains("extras", "a"));
        assert!(state.selection().contains("extras", "b"));
        assert!(!state.selection().contains("extras", "c"));
    }

    #[test]
    fn test_apply_defaults_keeps_user_choices() {
        let mut state = SelectionState::new(catalog());
        state.select("color", "blue").unwrap();
        state.apply_defaults();
        assert!(state.selection().contains("color", "blue"));
        assert!(!state.selection().contains("color", "red"));
    }

    #[test]
    fn test_apply_preset() {
        let mut state = SelectionState::new(catalog());
        state.select("color", "red").unwrap();
        state.apply_preset("p-sport").unwrap();

        let expected = Selection::from_pairs([("color", "blue"), ("extras", "a"), ("extras", "b")]);
        assert_eq!(state.snapshot(), expected);
    }

    #[test]
    fn test_apply_preset_errors() {
        let mut state = SelectionState::new(catalog());
        assert_matches!(state.apply_preset("nope"), Err(CoreError::UnknownPreset(_)));
        assert_matches!(state.apply_preset("p-off"), Err(CoreError::PresetInactive(_)));
    }

    #[test]
    fn test_validate_against() {
        let catalog = catalog();
        assert!(Selection::from_pairs([("color", "red")])
            .validate_against(&catalog)
            .is_ok());
        assert_matches!(
            Selection::from_pairs([("extras", "red")]).validate_against(&catalog),
            Err(CoreError::OptionNotInGroup { .. })
        );
        assert_matches!(
            SelectionState::with_selection(catalog, Selection::from_pairs([("size", "x")])),
            Err(CoreError::UnknownGroup(_))
        );
    }

    #[test]
    fn test_deserialize_drops_empty_groups() {
        let selection: Selection =
            serde_json::from_str(r#"{"groups":{"color":[],"extras":["a"]}}"#).unwrap();

        assert!(!selection.has_any_in_group("color"));
        assert!(selection.has_any_in_group("extras"));
        assert_eq!(selection, Selection::from_pairs([("extras", "a")]));

        let empty: Selection = serde_json::from_str(r#"{"groups":{"color":[]}}"#).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty, Selection::new());
    }
}
