//! Integration tests for tabula-core
//!
//! These tests exercise the full import → clean → aggregate → insight workflow
//! and the churn encode → split → fit → evaluate pipeline.

use std::collections::BTreeMap;

use tabula_core::{
    aggregate, clean, detect_dataset, parse_csv, AnalysisConfig, ChurnAnalysis, Dataset,
    Error, GroupingRequest, InsightEngine, InsightTopic, MetricSpec, SalesAnalysis,
};

/// Superstore-style export covering two years and four states
///
/// Tables and Bookcases lose money; November has the highest average line.
fn superstore_csv() -> &'static str {
    r#"Row ID,Order ID,Order Date,Ship Date,Customer ID,State,Category,Sub-Category,Sales,Profit
1,CA-101,01/03/2022,01/07/2022,CU-1,California,Furniture,Tables,420.00,-35.00
2,CA-101,01/03/2022,01/07/2022,CU-1,California,Office Supplies,Paper,25.00,11.50
3,CA-102,02/14/2022,02/18/2022,CU-2,New York,Technology,Phones,610.00,95.00
4,CA-103,05/22/2022,05/25/2022,CU-3,Texas,Furniture,Bookcases,240.00,-60.00
5,CA-104,11/09/2022,11/12/2022,CU-4,California,Technology,Copiers,1800.00,540.00
6,CA-105,11/28/2022,12/02/2022,CU-2,Washington,Office Supplies,Binders,95.00,31.00
7,CA-106,03/11/2023,03/15/2023,CU-5,Texas,Furniture,Tables,380.00,-75.00
8,CA-107,07/04/2023,07/08/2023,CU-1,New York,Office Supplies,Paper,40.00,18.00
9,CA-108,11/19/2023,11/21/2023,CU-6,California,Technology,Phones,990.00,160.00
10,CA-109,12/01/2023,12/05/2023,CU-3,Washington,Furniture,Chairs,310.00,22.00"#
}

fn telco_csv(rows: usize) -> String {
    let mut csv = String::from("customerID,gender,tenure,Contract,MonthlyCharges,TotalCharges,Churn\n");
    for i in 0..rows {
        let contract = ["Month-to-month", "One year", "Two year"][i % 3];
        let tenure = (i * 5) % 60 + 1;
        let monthly = 25.0 + ((i * 17) % 70) as f64;
        let churn = if contract == "Month-to-month" && tenure < 30 {
            "Yes"
        } else {
            "No"
        };
        csv.push_str(&format!(
            "{:04}-TEL,{},{},{},{:.2},{:.2},{}\n",
            i,
            if i % 2 == 0 { "Female" } else { "Male" },
            tenure,
            contract,
            monthly,
            tenure as f64 * monthly,
            churn
        ));
    }
    csv
}

// =============================================================================
// Sales Workflow
// =============================================================================

#[test]
fn test_detect_and_clean_sales_export() {
    let header = superstore_csv().lines().next().unwrap();
    assert_eq!(detect_dataset(header), Some(Dataset::Sales));

    let config = AnalysisConfig::embedded().unwrap();
    let raw = parse_csv(superstore_csv().as_bytes(), &config.sales.schema).unwrap();
    assert_eq!(raw.len(), 10);

    let outcome = clean(&raw, &config.sales.clean).unwrap();
    assert_eq!(outcome.report().output_rows, 10);

    let table = outcome.into_table().unwrap();
    for derived in ["Profit Margin", "Year", "Month", "Quarter"] {
        assert!(table.schema().contains(derived), "missing {}", derived);
    }
}

#[test]
fn test_full_sales_workflow() {
    let config = AnalysisConfig::embedded().unwrap();
    let analysis =
        SalesAnalysis::from_reader(superstore_csv().as_bytes(), &config.sales).unwrap();

    let metrics = analysis.key_metrics.as_ref().unwrap();
    assert!((metrics.total_sales - 4910.0).abs() < 1e-9);
    assert!((metrics.total_profit - 707.5).abs() < 1e-9);
    assert_eq!(metrics.total_orders, 9);
    assert_eq!(metrics.unique_customers, Some(6));

    let peak = analysis
        .insights
        .iter()
        .find(|i| i.topic == InsightTopic::PeakPeriod)
        .expect("peak period insight");
    // Nov lines: 1800, 95, 990
    assert!((peak.supporting_value - 2885.0 / 3.0).abs() < 1e-9);
    assert!(peak.statement.contains("Month=11"));

    let losses = analysis
        .insights
        .iter()
        .find(|i| i.topic == InsightTopic::LossMakers)
        .expect("loss makers insight");
    assert_eq!(losses.evidence.len(), 2);
    assert!((losses.supporting_value - -110.0).abs() < 1e-9);

    let top = analysis
        .insights
        .iter()
        .find(|i| i.topic == InsightTopic::TopEntity)
        .expect("top entity insight");
    assert!(top.statement.contains("California"));
    assert!((top.supporting_value - 3235.0).abs() < 1e-9);
}

#[test]
fn test_top_n_override_limits_state_ranking() {
    let config = AnalysisConfig::embedded().unwrap();
    let sales = config.sales.with_top_n(2).unwrap();
    let analysis = SalesAnalysis::from_reader(superstore_csv().as_bytes(), &sales).unwrap();

    let states = analysis.summary("top_states").unwrap();
    assert_eq!(states.len(), 2);
    assert_eq!(states.rows[0].key.to_string(), "California");
}

#[test]
fn test_engine_skips_rules_without_bound_grouping() {
    let config = AnalysisConfig::embedded().unwrap();
    let raw = parse_csv(superstore_csv().as_bytes(), &config.sales.schema).unwrap();
    let table = clean(&raw, &config.sales.clean)
        .unwrap()
        .into_table()
        .unwrap();

    let request = GroupingRequest::new("subcategory_profit", ["Sub-Category"])
        .metric(MetricSpec::sum("Profit", "Profit"));
    let summary = aggregate(&table, &request).unwrap();
    let summaries: BTreeMap<_, _> = [(summary.name.clone(), summary)].into_iter().collect();

    let insights = InsightEngine::new()
        .evaluate(&summaries, &config.sales.rules)
        .unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].topic, InsightTopic::LossMakers);
}

#[test]
fn test_missing_declared_column_is_reported() {
    let config = AnalysisConfig::embedded().unwrap();
    let csv = "Order ID,Order Date,Sales\nCA-1,01/01/2023,10.00\n";
    let err = SalesAnalysis::from_reader(csv.as_bytes(), &config.sales).unwrap_err();
    assert!(matches!(err, Error::MissingColumn(_)));
}

// =============================================================================
// Churn Workflow
// =============================================================================

#[test]
fn test_full_churn_workflow() {
    let csv = telco_csv(150);
    assert_eq!(
        detect_dataset(csv.lines().next().unwrap()),
        Some(Dataset::Churn)
    );

    let config = AnalysisConfig::embedded().unwrap();
    let analysis = ChurnAnalysis::from_reader(csv.as_bytes(), &config.churn).unwrap();
    assert_eq!(analysis.clean.output_rows, 150);

    let by_contract = &analysis.rates[0];
    let two_year = by_contract
        .rows
        .iter()
        .find(|r| r.key.to_string() == "Two year")
        .unwrap();
    assert_eq!(two_year.values[0], Some(0.0));

    let model = analysis.model.as_ref().unwrap();
    assert_eq!(model.test_rows, 30);
    assert_eq!(model.train_rows, 120);
    assert!(model.evaluation.accuracy >= 0.0 && model.evaluation.accuracy <= 1.0);
    assert_eq!(model.evaluation.confusion_matrix.total(), 30);
}

#[test]
fn test_churn_workflow_is_reproducible() {
    let csv = telco_csv(90);
    let config = AnalysisConfig::embedded().unwrap();

    let first = ChurnAnalysis::from_reader(csv.as_bytes(), &config.churn).unwrap();
    let second = ChurnAnalysis::from_reader(csv.as_bytes(), &config.churn).unwrap();

    let (a, b) = (first.model.unwrap(), second.model.unwrap());
    assert_eq!(a.model, b.model);
    assert_eq!(a.evaluation, b.evaluation);
}
