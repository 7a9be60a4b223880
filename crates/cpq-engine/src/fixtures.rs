//! Shared test data: a configurable workstation and a small product catalog.

use cpq_core::catalog::{
    CatalogOption, ConfigurationRule, DisplayMode, OptionGroup, PriceModifier, PriceTier, Preset,
    RuleKind, RuleRef, SelectionType, SourceType, Template, TemplateRecord, TierDiscount,
};
use cpq_core::price_list::{PriceList, PriceListItem, PriceListScope};
use cpq_core::{Money, Percent};

use crate::store::InMemoryStore;

pub const TENANT: &str = "00000000-0000-0000-0000-000000000001";

fn option(id: &str, group_id: &str, cents: i64, product_id: Option<&str>) -> CatalogOption {
    CatalogOption {
        id: id.to_string(),
        group_id: group_id.to_string(),
        name: id.replace('-', " "),
        display_order: 0,
        price_modifier: PriceModifier::Add(Money::from_cents(cents)),
        is_default: false,
        is_available: true,
        product_id: product_id.map(str::to_string),
    }
}

fn default_option(id: &str, group_id: &str) -> CatalogOption {
    CatalogOption {
        is_default: true,
        ..option(id, group_id, 0, None)
    }
}

fn group(
    id: &str,
    selection_type: SelectionType,
    is_required: bool,
    max_selections: Option<u32>,
    options: Vec<CatalogOption>,
) -> OptionGroup {
    OptionGroup {
        id: id.to_string(),
        template_id: "workstation".to_string(),
        name: id.to_string(),
        display_order: 0,
        selection_type,
        is_required,
        min_selections: u32::from(is_required),
        max_selections,
        source_type: SourceType::Manual,
        options,
    }
}

fn rule(id: &str, kind: RuleKind) -> ConfigurationRule {
    ConfigurationRule {
        id: id.to_string(),
        template_id: "workstation".to_string(),
        name: String::new(),
        priority: 0,
        is_active: true,
        error_message: None,
        kind,
    }
}

/// Workstation: base 1000.00.
///
/// - size (single, required): size-120 (default), size-160 +200.00
/// - legs (single, required): legs-fixed (default), legs-electric +800.00
/// - extras (multiple, max 2): cable-tray +50, monitor-arm +150, lamp-clip +30
/// - legs-electric auto-selects cable-tray
/// - monitor-arm requires size-160
/// - 5% off from 5 units
/// - preset "p-pro": size-160, legs-electric, monitor-arm
pub fn workstation() -> TemplateRecord {
    let mut requires = rule(
        "r-arm-needs-160",
        RuleKind::Requires {
            condition: RuleRef::Option("monitor-arm".to_string()),
            target: RuleRef::Option("size-160".to_string()),
            allowed_options: Vec::new(),
        },
    );
    requires.error_message = Some("Monitor arm needs the 160 cm top".to_string());

    TemplateRecord {
        template: Template {
            id: "workstation".to_string(),
            name: "Workstation".to_string(),
            base_price: Money::from_cents(100_000),
            display_mode: DisplayMode::SinglePage,
            is_active: true,
        },
        option_groups: vec![
            group(
                "size",
                SelectionType::Single,
                true,
                None,
                vec![
                    default_option("size-120", "size"),
                    option("size-160", "size", 20_000, Some("top-160")),
                ],
            ),
            group(
                "legs",
                SelectionType::Single,
                true,
                None,
                vec![
                    default_option("legs-fixed", "legs"),
                    option("legs-electric", "legs", 80_000, Some("motor-kit")),
                ],
            ),
            group(
                "extras",
                SelectionType::Multiple,
                false,
                Some(2),
                vec![
                    option("cable-tray", "extras", 5_000, None),
                    option("monitor-arm", "extras", 15_000, None),
                    option("lamp-clip", "extras", 3_000, None),
                ],
            ),
        ],
        rules: vec![
            rule(
                "r-auto-tray",
                RuleKind::AutoSelect {
                    condition: RuleRef::Option("legs-electric".to_string()),
                    option_id: "cable-tray".to_string(),
                },
            ),
            requires,
            rule(
                "r-tier-5",
                RuleKind::PriceTier {
                    tier: PriceTier {
                        quantity_min: 5,
                        quantity_max: None,
                        discount: TierDiscount::Percentage(Percent::from_whole(5)),
                    },
                },
            ),
        ],
        presets: vec![Preset {
            id: "p-pro".to_string(),
            template_id: "workstation".to_string(),
            name: "Pro".to_string(),
            is_active: true,
            selections: [
                ("size".to_string(), vec!["size-160".to_string()]),
                ("legs".to_string(), vec!["legs-electric".to_string()]),
                ("extras".to_string(), vec!["monitor-arm".to_string()]),
            ]
            .into_iter()
            .collect(),
        }],
    }
}

/// Store with the workstation, plain products and a general price list
/// (chair 90.00, 80.00 from 10 units).
pub fn store() -> InMemoryStore {
    InMemoryStore::new()
        .with_template(workstation())
        .with_product("workstation", Money::from_cents(50_000), Money::from_cents(100_000))
        .with_product("top-160", Money::from_cents(8_000), Money::from_cents(20_000))
        .with_product("motor-kit", Money::from_cents(30_000), Money::from_cents(80_000))
        .with_product("chair", Money::from_cents(4_000), Money::from_cents(9_900))
        .with_product("support", Money::from_cents(2_000), Money::from_cents(8_000))
        .with_price_list(
            TENANT,
            PriceList {
                id: "pl-general".to_string(),
                name: "General".to_string(),
                currency: "ILS".to_string(),
                scope: PriceListScope::General,
                items: vec![
                    PriceListItem {
                        product_id: "chair".to_string(),
                        min_quantity: 1,
                        unit_price: Money::from_cents(9_000),
                        discount_percent: Percent::zero(),
                    },
                    PriceListItem {
                        product_id: "chair".to_string(),
                        min_quantity: 10,
                        unit_price: Money::from_cents(8_000),
                        discount_percent: Percent::zero(),
                    },
                ],
            },
        )
}
