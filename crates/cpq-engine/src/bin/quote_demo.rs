//! Walks one configuration from defaults to a priced quote.
//!
//! ```text
//! quote-demo                     # built-in bicycle template
//! quote-demo template.json       # any TemplateRecord serialized as JSON
//! RUST_LOG=debug quote-demo      # show resolver memo hits and session steps
//! ```

use std::sync::Arc;
use tracing::{info, warn};

use cpq_core::catalog::{
    CatalogOption, ConfigurationRule, DisplayMode, OptionGroup, PriceModifier, PriceTier, RuleKind,
    RuleRef, SelectionType, SourceType, Template, TemplateRecord, TierDiscount,
};
use cpq_core::price_list::{PriceList, PriceListItem, PriceListScope};
use cpq_core::publish::validate_for_publish;
use cpq_core::{BillingFrequency, Catalog, Money, Multiplier, Percent};
use cpq_engine::telemetry::init_tracing;
use cpq_engine::{ConfigurationSession, EngineConfig, InMemoryStore, QuoteBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = EngineConfig::load_or_default(None);
    info!(tenant_id = %config.tenant_id(), currency = %config.currency(), "Configuration loaded");

    let record = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "Loading template record");
            serde_json::from_str::<TemplateRecord>(&std::fs::read_to_string(path)?)?
        }
        None => demo_record(),
    };
    let template_id = record.template.id.clone();

    let report = validate_for_publish(&Catalog::from_record(record.clone()));
    if !report.valid {
        for error in &report.errors {
            warn!(%error, "Template is not publishable");
        }
    }

    let store = Arc::new(demo_store(config.tenant_id(), record));

    let mut session = ConfigurationSession::open(store.as_ref(), &template_id).await?;
    if template_id == "bike" {
        session.select("frame", "frame-carbon")?;
        session.select("brakes", "brakes-disc")?;
        session.set_quantity(4)?;
    }

    let summary = session.summary()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let mut builder = QuoteBuilder::new(config, Arc::clone(&store))?.for_customer("acme");
    if summary.is_valid() {
        builder.add_configured(&session).await?;
    } else {
        warn!(violations = summary.evaluation.violations.len(), "Configuration left out of the quote");
    }
    builder.add_product("helmet", "Helmet", 4).await?;
    builder
        .add_recurring("service-plan", "Service plan", 1, BillingFrequency::Yearly)
        .await?;

    for warning in builder.warnings() {
        warn!(%warning, "Price resolution fell back");
    }

    let totals = builder.totals();
    println!("{}", serde_json::to_string_pretty(&totals)?);

    let quote = builder.finish();
    info!(quote_id = %quote.id, grand_total = %totals.grand_total, "Done");
    Ok(())
}

// =============================================================================
// Demo Data
// =============================================================================

fn option(id: &str, group_id: &str, modifier: PriceModifier, is_default: bool) -> CatalogOption {
    CatalogOption {
        id: id.to_string(),
        group_id: group_id.to_string(),
        name: id.replace('-', " "),
        display_order: 0,
        price_modifier: modifier,
        is_default,
        is_available: true,
        product_id: None,
    }
}

fn group(id: &str, selection_type: SelectionType, is_required: bool, options: Vec<CatalogOption>) -> OptionGroup {
    OptionGroup {
        id: id.to_string(),
        template_id: "bike".to_string(),
        name: id.to_string(),
        display_order: 0,
        selection_type,
        is_required,
        min_selections: u32::from(is_required),
        max_selections: None,
        source_type: SourceType::Manual,
        options,
    }
}

fn demo_record() -> TemplateRecord {
    let add = |cents| PriceModifier::Add(Money::from_cents(cents));

    TemplateRecord {
        template: Template {
            id: "bike".to_string(),
            name: "City bike".to_string(),
            base_price: Money::from_major(1_200),
            display_mode: DisplayMode::Wizard,
            is_active: true,
        },
        option_groups: vec![
            group(
                "frame",
                SelectionType::Single,
                true,
                vec![
                    option("frame-steel", "frame", add(0), true),
                    option("frame-carbon", "frame", add(90_000), false),
                ],
            ),
            group(
                "brakes",
                SelectionType::Single,
                true,
                vec![
                    option("brakes-rim", "brakes", add(0), true),
                    option("brakes-disc", "brakes", add(25_000), false),
                ],
            ),
            group(
                "finish",
                SelectionType::Single,
                false,
                vec![option(
                    "finish-gloss",
                    "finish",
                    PriceModifier::Multiply(Multiplier::from_ten_thousandths(10_500)),
                    false,
                )],
            ),
        ],
        rules: vec![
            ConfigurationRule {
                id: "carbon-needs-disc".to_string(),
                template_id: "bike".to_string(),
                name: "Carbon frames ship with disc brakes".to_string(),
                priority: 0,
                is_active: true,
                error_message: None,
                kind: RuleKind::Requires {
                    condition: RuleRef::Option("frame-carbon".to_string()),
                    target: RuleRef::Option("brakes-disc".to_string()),
                    allowed_options: Vec::new(),
                },
            },
            ConfigurationRule {
                id: "fleet-discount".to_string(),
                template_id: "bike".to_string(),
                name: "Fleet discount".to_string(),
                priority: 0,
                is_active: true,
                error_message: None,
                kind: RuleKind::PriceTier {
                    tier: PriceTier {
                        quantity_min: 3,
                        quantity_max: None,
                        discount: TierDiscount::Percentage(Percent::from_whole(8)),
                    },
                },
            },
        ],
        presets: Vec::new(),
    }
}

fn demo_store(tenant_id: &str, record: TemplateRecord) -> InMemoryStore {
    InMemoryStore::new()
        .with_template(record)
        .with_product("bike", Money::from_major(700), Money::from_major(1_200))
        .with_product("helmet", Money::from_major(60), Money::from_major(150))
        .with_product("service-plan", Money::from_major(100), Money::from_major(400))
        .with_price_list(
            tenant_id,
            PriceList {
                id: "acme-2026".to_string(),
                name: "Acme 2026".to_string(),
                currency: "ILS".to_string(),
                scope: PriceListScope::Customer {
                    customer_id: "acme".to_string(),
                },
                items: vec![PriceListItem {
                    product_id: "helmet".to_string(),
                    min_quantity: 4,
                    unit_price: Money::from_major(130),
                    discount_percent: Percent::zero(),
                }],
            },
        )
}
