// End-to-end: CSV text → pipeline → bundle → SQLite

use regional_sales::analysis::{
    CHANNEL_SALES_COUNT, FOCUS_PRODUCTS_CORRELATION, MONTHLY_SALES_VARIANCE, REGION_HOUSEHOLD_METRICS,
    SALES_BY_REGION, TOP_PRODUCTS_BY_SALES,
};
use regional_sales::schema::{PRODUCTS_SCHEMA, REGIONS_SCHEMA, STATE_REGIONS_SCHEMA, TRANSACTIONS_SCHEMA};
use regional_sales::{
    insert_run, latest_run, list_reports, load_report, parse_table, setup_database, KeyValue, Measure, Month,
    Pipeline, PipelineConfig, ReportTable, SourceTables,
};
use rusqlite::Connection;

const TRANSACTIONS: &str = "\
OrderNumber,OrderDate,Channel,DeliveryRegionId,ProductId,LineTotal,TotalUnitCost
SO-1,2018-01-15,Wholesale,1,10,200,120
SO-1,2018-01-15,Wholesale,1,11,100,50
SO-2,2018-12-03,Distributor,2,10,1000,400
SO-3,2019-03-20,Export,3,12,50,20
SO-4,2019-12-24,Wholesale,99,10,80,40
SO-5,2019-07-04,Export,1,77,30,10
";

const REGIONS: &str = "\
id,state
1,California
2,Texas
3,Vermont
";

const STATE_REGIONS: &str = "\
Census regions,,
State,Region,households
California,West,13000
Texas,South,10000
Vermont,Northeast,0
";

const PRODUCTS: &str = "\
id,productName
10,Widget
11,Gadget
12,Gizmo
";

fn sources() -> SourceTables {
    SourceTables {
        transactions: parse_table(TRANSACTIONS.as_bytes(), &TRANSACTIONS_SCHEMA).unwrap(),
        regions: parse_table(REGIONS.as_bytes(), &REGIONS_SCHEMA).unwrap(),
        state_regions: parse_table(STATE_REGIONS.as_bytes(), &STATE_REGIONS_SCHEMA).unwrap(),
        products: parse_table(PRODUCTS.as_bytes(), &PRODUCTS_SCHEMA).unwrap(),
    }
}

#[test]
fn test_every_transaction_survives_the_joins() {
    let output = Pipeline::new(PipelineConfig::default()).run(&sources());

    assert_eq!(output.input_rows, 6);
    assert_eq!(output.fact_rows, 6);
    assert_eq!(output.join_report.unmatched_region_ids.get(&99), Some(&1));
    assert_eq!(output.join_report.unmatched_product_ids.get(&77), Some(&1));
    assert!(output.reports.failures().is_empty(), "{:?}", output.reports.failures());
}

#[test]
fn test_region_totals_sum_to_grand_total() {
    let output = Pipeline::new(PipelineConfig::default()).run(&sources());
    let table = output.reports.grouped(SALES_BY_REGION).unwrap();

    // South 1000, West 330, Unknown 80, Northeast 50
    assert_eq!(
        table.leading_keys(),
        vec![
            KeyValue::text("South"),
            KeyValue::text("West"),
            KeyValue::Unknown,
            KeyValue::text("Northeast"),
        ]
    );
    assert_eq!(table.total("revenue").unwrap(), 1460.0);
}

#[test]
fn test_zero_household_region() {
    let output = Pipeline::new(PipelineConfig::default()).run(&sources());
    let table = output.reports.grouped(REGION_HOUSEHOLD_METRICS).unwrap();

    let northeast = [KeyValue::text("Northeast")];
    assert_eq!(
        table.value(&northeast, "revenue_per_household").unwrap(),
        Some(Measure::NotComputable)
    );
    assert_eq!(
        table.value(&[KeyValue::text("South")], "profit_per_household").unwrap(),
        Some(Measure::Value(0.06))
    );

    let json = output.to_json().unwrap();
    assert!(json.contains("\"not_computable\""));
    assert!(output.quality.issues.iter().any(|i| i.field == "households"));
}

#[test]
fn test_channel_counts_and_product_ranking() {
    let output = Pipeline::new(PipelineConfig::default()).run(&sources());

    let channels = output.reports.grouped(CHANNEL_SALES_COUNT).unwrap();
    assert_eq!(channels.rows[0].keys, vec![KeyValue::text("Wholesale")]);
    assert_eq!(channels.rows[0].values[0], Measure::Value(3.0));

    let products = output.reports.grouped(TOP_PRODUCTS_BY_SALES).unwrap();
    assert_eq!(products.rows[0].keys, vec![KeyValue::text("Widget")]);
    assert_eq!(products.rows[0].values[0], Measure::Value(1280.0));
}

#[test]
fn test_monthly_variance_and_correlation() {
    let output = Pipeline::new(PipelineConfig::default()).run(&sources());

    let Some(ReportTable::Seasonal(profile)) = output.reports.table(MONTHLY_SALES_VARIANCE) else {
        panic!("expected a seasonal profile");
    };
    assert_eq!(profile.peak_month, Month::December);
    assert_eq!(profile.peak_value, 1080.0);
    // Several months have no sales at all
    assert_eq!(profile.spread_percent, Measure::NotComputable);

    let Some(ReportTable::Correlation(matrix)) = output.reports.table(FOCUS_PRODUCTS_CORRELATION) else {
        panic!("expected a correlation matrix");
    };
    let widget = KeyValue::text("Widget");
    assert_eq!(matrix.get(&widget, &widget), Some(Measure::Value(1.0)));
}

#[test]
fn test_run_round_trips_through_sqlite() {
    let output = Pipeline::new(PipelineConfig::default()).run(&sources());

    let mut conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    insert_run(&mut conn, &output).unwrap();

    let run = latest_run(&conn).unwrap().unwrap();
    assert_eq!(run.run_id, output.run_id);
    assert_eq!(run.fact_rows, 6);
    assert_eq!(run.unmatched_region_rows, 1);

    let reports = list_reports(&conn, &run.run_id).unwrap();
    assert_eq!(reports.len(), output.reports.len());

    let cells = load_report(&conn, &run.run_id, REGION_HOUSEHOLD_METRICS).unwrap();
    let northeast_per_hh = cells
        .iter()
        .find(|c| c.row_label == "Northeast" && c.column == "revenue_per_household")
        .unwrap();
    assert_eq!(northeast_per_hh.value, Measure::NotComputable);
}
