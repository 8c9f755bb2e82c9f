//! End-to-end discovery against in-memory catalogs.

mod common;

use std::sync::Arc;

use aggnav::binder::{ColumnUsage, JoinTarget};
use aggnav::candidate::RuleSource;
use aggnav::catalog::{TableInfo, TableUsage};
use aggnav::config::{RecorderSettings, Settings};
use aggnav::model::{Aggregator, Cube, LogicalStar, StarSchema};
use aggnav::navigator::{AggTableManager, DiscoveryState};
use aggnav::recorder::Severity;
use aggnav::rules::{ColumnOverride, ExplicitRuleGroup, IncludeRule, TableMatcher};
use aggnav::AggError;
use insta::assert_snapshot;

use common::{registered_names, sales_catalog, sales_schema, sales_schema_with_rules, SharedCatalog};

fn limited(error_limit: usize) -> Settings {
    Settings {
        recorder: RecorderSettings { error_limit },
        ..Settings::default()
    }
}

#[test]
fn test_default_convention_registers_aggregate() {
    let schema = sales_schema();
    let mut manager = AggTableManager::new(Arc::new(sales_catalog()));

    let report = manager.discover(&schema).unwrap();

    let star = schema.star("sales").unwrap();
    let aggregates = star.aggregates();
    assert_eq!(aggregates.len(), 1);

    let candidate = &aggregates[0];
    assert_eq!(candidate.name(), "agg_c_14_sales_fact");
    assert_eq!(candidate.source, RuleSource::Default);
    assert!(candidate.cost > 0);
    assert_eq!(
        candidate.binding.usages_of("unit_sales"),
        &[ColumnUsage::Measure {
            measure: "unit_sales".into(),
            aggregator: Aggregator::Sum,
        }]
    );
    assert_eq!(
        candidate.binding.usages_of("product_id"),
        &[ColumnUsage::JoinKey {
            target: JoinTarget::Dimension("product".into()),
        }]
    );
    assert_eq!(
        candidate.binding.usages_of("fact_count"),
        &[ColumnUsage::Unassigned]
    );

    let sales = report.star("sales").unwrap();
    assert_eq!(sales.state, DiscoveryState::Committed);
    assert_eq!(sales.registered, vec!["agg_c_14_sales_fact"]);
    assert_eq!(sales.warning_count, 0);
    assert_eq!(sales.error_count, 0);
}

#[test]
fn test_marks_fact_and_aggregate_usage() {
    let schema = sales_schema();
    let mut manager = AggTableManager::new(Arc::new(sales_catalog()));
    manager.discover(&schema).unwrap();

    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.usage("sales_fact"), Some(TableUsage::Fact));
    assert_eq!(
        snapshot.usage("agg_c_14_sales_fact"),
        Some(TableUsage::Aggregate)
    );
    assert_eq!(snapshot.usage("product"), None);
}

#[test]
fn test_explicit_match_with_bad_columns_is_skipped_quietly() {
    let mut catalog = sales_catalog();
    catalog.add_table(TableInfo::new("agg_bad"), &[("unit_sales", "decimal")]);
    let rules = ExplicitRuleGroup::new("sales").with_include(
        IncludeRule::new(TableMatcher::name("agg_bad")).with_override(
            ColumnOverride::ForeignKey {
                column: "product_id".into(),
                fact_column: "product_id".into(),
            },
        ),
    );
    let schema = sales_schema_with_rules(rules);
    let mut manager = AggTableManager::new(Arc::new(catalog));

    let report = manager.discover(&schema).unwrap();

    let star = schema.star("sales").unwrap();
    assert_eq!(registered_names(star), vec!["agg_c_14_sales_fact"]);

    let sales = report.star("sales").unwrap();
    assert_eq!(sales.error_count, 0);
    assert_eq!(sales.warning_count, 0);
    let notes: Vec<String> = sales
        .messages
        .iter()
        .filter(|m| m.severity == Severity::Info)
        .map(|m| m.to_string())
        .collect();
    assert_snapshot!(notes.join("\n"), @"sales:agg_bad: column 'product_id' named by rule not found in 'agg_bad'");
}

#[test]
fn test_missing_fact_table_skips_star_only() {
    let schema = StarSchema::new()
        .with_star(common::sales_star())
        .with_star(
            LogicalStar::new("inventory", "inventory_fact")
                .with_measure("units_shipped", "units_shipped", Aggregator::Sum),
        )
        .with_cube(Cube::new("Sales", "sales"))
        .with_cube(Cube::new("Warehouse", "inventory"));
    let mut manager = AggTableManager::new(Arc::new(sales_catalog()));

    let report = manager.discover(&schema).unwrap();

    let inventory = report.star("inventory").unwrap();
    assert_eq!(inventory.state, DiscoveryState::Skipped);
    assert_eq!(inventory.warning_count, 1);
    assert!(inventory.messages[0].text.contains("inventory_fact"));
    assert!(schema.star("inventory").unwrap().aggregates().is_empty());

    assert_eq!(
        report.star("sales").unwrap().state,
        DiscoveryState::Committed
    );
    assert_eq!(schema.star("sales").unwrap().aggregates().len(), 1);
}

#[test]
fn test_zero_cost_candidate_warns_once() {
    let mut catalog = sales_catalog();
    catalog.add_table(
        TableInfo::new("agg_z_sales_fact").with_row_count(0),
        &[("unit_sales", "decimal"), ("product_id", "integer")],
    );
    let schema = sales_schema();
    let mut manager = AggTableManager::new(Arc::new(catalog));

    let report = manager.discover(&schema).unwrap();

    let star = schema.star("sales").unwrap();
    assert_eq!(registered_names(star), vec!["agg_c_14_sales_fact"]);

    let sales = report.star("sales").unwrap();
    assert_eq!(sales.error_count, 0);
    assert_eq!(sales.warning_count, 1);
    let warning = sales
        .messages
        .iter()
        .find(|m| m.severity == Severity::Warning)
        .unwrap();
    assert_eq!(warning.context, "sales:agg_z_sales_fact");
    assert!(warning.text.contains("agg_z_sales_fact"));
    assert!(warning.text.contains("sales_fact"));
}

#[test]
fn test_aggregates_ordered_by_cost() {
    let columns = [("unit_sales", "decimal"), ("product_id", "integer")];
    let catalog = sales_catalog()
        .with_table(TableInfo::new("agg_l_05_sales_fact").with_row_count(5_000), &columns)
        .with_table(TableInfo::new("agg_g_ms_sales_fact").with_row_count(50), &columns)
        .with_table(TableInfo::new("agg_pl_01_sales_fact").with_row_count(500), &columns);
    let schema = sales_schema();
    let mut manager = AggTableManager::new(Arc::new(catalog));

    manager.discover(&schema).unwrap();

    let star = schema.star("sales").unwrap();
    // agg_c_14_sales_fact has no row count and is estimated one row below the fact table
    assert_eq!(
        registered_names(star),
        vec![
            "agg_g_ms_sales_fact",
            "agg_pl_01_sales_fact",
            "agg_l_05_sales_fact",
            "agg_c_14_sales_fact",
        ]
    );
    let costs: Vec<i64> = star.aggregates().iter().map(|a| a.cost).collect();
    assert_eq!(costs, vec![50, 500, 5_000, 86_836]);
}

#[test]
fn test_unmeasured_table_sorts_after_hinted_table() {
    let catalog = sales_catalog().with_table(
        TableInfo::new("agg_hinted"),
        &[("unit_sales", "decimal"), ("product_id", "integer")],
    );
    let rules = ExplicitRuleGroup::new("sales").with_include(
        IncludeRule::new(TableMatcher::name("agg_hinted")).with_approx_row_count(1_000),
    );
    let schema = sales_schema_with_rules(rules);
    let mut manager = AggTableManager::new(Arc::new(catalog));

    manager.discover(&schema).unwrap();

    assert_eq!(
        registered_names(schema.star("sales").unwrap()),
        vec!["agg_hinted", "agg_c_14_sales_fact"]
    );
}

#[test]
fn test_malformed_rules_hit_error_ceiling() {
    let mut rules = ExplicitRuleGroup::new("broken");
    for _ in 0..12 {
        rules = rules.with_include(IncludeRule::new(TableMatcher::default()));
    }
    let schema = sales_schema_with_rules(rules);
    let mut manager = AggTableManager::new(Arc::new(sales_catalog()));

    let err = manager.discover(&schema).unwrap_err();

    assert_eq!(err.error_count(), Some(10));
    match err {
        AggError::Aborted { star, messages, .. } => {
            assert_eq!(star, "sales");
            assert_eq!(messages.len(), 10);
            assert!(messages.iter().all(|m| m.severity == Severity::Error));
            assert_eq!(messages[0].context, "sales:broken");
        }
        other => panic!("expected Aborted, got {other:?}"),
    }
    assert!(schema.star("sales").unwrap().aggregates().is_empty());
}

#[test]
fn test_malformed_rule_fails_load_but_keeps_aggregates() {
    let rules = ExplicitRuleGroup::new("sales")
        .with_include(IncludeRule::new(TableMatcher::pattern("agg_(")))
        .with_exclude(TableMatcher::name("agg_old_sales_fact"));
    let catalog = sales_catalog().with_table(
        TableInfo::new("agg_old_sales_fact"),
        &[("unit_sales", "decimal")],
    );
    let schema = sales_schema_with_rules(rules);
    let mut manager = AggTableManager::new(Arc::new(catalog));

    let err = manager.discover(&schema).unwrap_err();

    match err {
        AggError::LoadFailed { errors, report } => {
            assert_eq!(errors, 1);
            let sales = report.star("sales").unwrap();
            assert_eq!(sales.state, DiscoveryState::Committed);
            assert_eq!(sales.registered, vec!["agg_c_14_sales_fact"]);
        }
        other => panic!("expected LoadFailed, got {other:?}"),
    }
    assert_eq!(
        registered_names(schema.star("sales").unwrap()),
        vec!["agg_c_14_sales_fact"]
    );
}

#[test]
fn test_column_load_failure_is_an_error() {
    let catalog = Arc::new(SharedCatalog::new(sales_catalog().with_table(
        TableInfo::new("agg_b_sales_fact"),
        &[("unit_sales", "decimal")],
    )));
    catalog.fail_columns_of("agg_b_sales_fact");
    let schema = sales_schema();
    let mut manager = AggTableManager::new(catalog.clone());

    let err = manager.discover(&schema).unwrap_err();

    assert!(matches!(err, AggError::LoadFailed { errors: 1, .. }));
    assert_eq!(
        registered_names(schema.star("sales").unwrap()),
        vec!["agg_c_14_sales_fact"]
    );
}

#[test]
fn test_ceiling_during_scan_clears_star() {
    let columns = [("unit_sales", "decimal"), ("product_id", "integer")];
    let catalog = Arc::new(SharedCatalog::new(
        sales_catalog()
            .with_table(TableInfo::new("agg_a_sales_fact"), &columns)
            .with_table(TableInfo::new("agg_b_sales_fact"), &columns),
    ));
    let schema = sales_schema();
    let mut manager = AggTableManager::with_settings(catalog.clone(), limited(2)).unwrap();

    manager.discover(&schema).unwrap();
    assert_eq!(schema.star("sales").unwrap().aggregates().len(), 3);

    catalog.fail_columns_of("agg_c_14_sales_fact");
    catalog.fail_columns_of("agg_a_sales_fact");
    let err = manager.reload(&schema).unwrap_err();

    match err {
        AggError::Aborted { star, messages, .. } => {
            assert_eq!(star, "sales");
            assert_eq!(messages.len(), 2);
        }
        other => panic!("expected Aborted, got {other:?}"),
    }
    assert!(schema.star("sales").unwrap().aggregates().is_empty());
}

#[test]
fn test_aborted_scan_leaves_no_aggregate_marks() {
    let columns = [("unit_sales", "decimal"), ("product_id", "integer")];
    let catalog = Arc::new(SharedCatalog::new(
        sales_catalog()
            .with_table(TableInfo::new("agg_a_sales_fact"), &columns)
            .with_table(TableInfo::new("agg_b_sales_fact"), &columns),
    ));
    catalog.fail_columns_of("agg_a_sales_fact");
    catalog.fail_columns_of("agg_b_sales_fact");
    let schema = sales_schema();
    let mut manager = AggTableManager::with_settings(catalog.clone(), limited(2)).unwrap();

    let err = manager.discover(&schema).unwrap_err();

    assert!(matches!(err, AggError::Aborted { .. }));
    assert!(schema.star("sales").unwrap().aggregates().is_empty());
    // agg_c_14_sales_fact validated before the abort but was never committed
    let snapshot = manager.snapshot().unwrap();
    assert_eq!(snapshot.usage("agg_c_14_sales_fact"), None);
    assert_eq!(snapshot.usage("sales_fact"), Some(TableUsage::Fact));
}

#[test]
fn test_table_dropped_by_later_run_loses_aggregate_mark() {
    let mut manager = AggTableManager::new(Arc::new(sales_catalog()));

    manager.discover(&sales_schema()).unwrap();
    assert_eq!(
        manager.snapshot().unwrap().usage("agg_c_14_sales_fact"),
        Some(TableUsage::Aggregate)
    );

    let rules = ExplicitRuleGroup::new("sales")
        .with_exclude(TableMatcher::name("agg_c_14_sales_fact"));
    let schema = sales_schema_with_rules(rules);
    manager.discover(&schema).unwrap();

    assert!(schema.star("sales").unwrap().aggregates().is_empty());
    assert_eq!(manager.snapshot().unwrap().usage("agg_c_14_sales_fact"), None);
}

#[test]
fn test_discover_star_lets_caller_continue_after_abort() {
    let mut rules = ExplicitRuleGroup::new("broken");
    for _ in 0..3 {
        rules = rules.with_include(IncludeRule::new(TableMatcher::default()));
    }
    let catalog = sales_catalog()
        .with_table(
            TableInfo::new("inventory_fact"),
            &[("units_shipped", "decimal"), ("product_id", "integer")],
        )
        .with_table(
            TableInfo::new("agg_w_inventory_fact"),
            &[("units_shipped", "decimal")],
        );
    let schema = StarSchema::new()
        .with_star(common::sales_star())
        .with_star(
            LogicalStar::new("inventory", "inventory_fact")
                .with_measure("units_shipped", "units_shipped", Aggregator::Sum)
                .with_foreign_key("product_id", "product"),
        )
        .with_cube(Cube::new("Sales", "sales").with_rules(rules))
        .with_cube(Cube::new("Warehouse", "inventory"));
    let mut manager = AggTableManager::with_settings(Arc::new(catalog), limited(3)).unwrap();

    let mut aborted = Vec::new();
    let mut committed = Vec::new();
    for star in schema.stars() {
        match manager.discover_star(&schema, star) {
            Ok(report) => committed.push(report.star),
            Err(AggError::Aborted { star, .. }) => aborted.push(star),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(aborted, vec!["sales"]);
    assert_eq!(committed, vec!["inventory"]);
    assert_eq!(
        registered_names(schema.star("inventory").unwrap()),
        vec!["agg_w_inventory_fact"]
    );
}

#[test]
fn test_invalid_settings_are_rejected() {
    let mut settings = Settings::default();
    settings.default_rules.table_templates = vec!["agg_.+".into()];

    let result = AggTableManager::with_settings(Arc::new(sales_catalog()), settings);

    assert!(matches!(result, Err(AggError::Settings(_))));
}

#[test]
fn test_custom_table_template() {
    let mut settings = Settings::default();
    settings.default_rules.table_templates = vec!["${fact_name}_rollup_.+".into()];
    let catalog = sales_catalog().with_table(
        TableInfo::new("sales_fact_rollup_month"),
        &[("unit_sales", "decimal"), ("product_id", "integer")],
    );
    let schema = sales_schema();
    let mut manager = AggTableManager::with_settings(Arc::new(catalog), settings).unwrap();

    manager.discover(&schema).unwrap();

    assert_eq!(
        registered_names(schema.star("sales").unwrap()),
        vec!["sales_fact_rollup_month"]
    );
}
