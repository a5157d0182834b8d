// 📊 Report battery - every named result of one pipeline run
//
// Each report is computed independently from the same immutable fact rows
// and stored in the ResultBundle under its name. A report that reads
// another report's table fails with DependencyFailed when that one failed.

use crate::aggregate::{aggregate, AggregateRow, AggregateSpec, AggregateTable, Field, GroupKey, KeyValue, Reduction};
use crate::calendar::Month;
use crate::config::PipelineConfig;
use crate::correlation::correlation_matrix;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{self, Measure};
use crate::pivot::{pivot, PivotTable};
use crate::rank::{self, Direction};
use crate::report::{ReportTable, ResultBundle};
use crate::schema::DerivedTransaction;
use crate::seasonal::{seasonal_profile, MonthlySeries, SeasonalComparison};

// ============================================================================
// REPORT NAMES
// ============================================================================

pub const SALES_BY_REGION: &str = "sales_by_region";
pub const SALES_BY_YEAR_REGION: &str = "sales_by_year_region";
pub const REGION_HOUSEHOLD_METRICS: &str = "region_household_metrics";
pub const PROFIT_PER_SALE_BY_REGION: &str = "profit_per_sale_by_region";
pub const BEST_REGION_BY_AVG_PROFIT: &str = "best_region_by_avg_profit";
pub const CHANNEL_SALES_COUNT: &str = "channel_sales_count";
pub const CHANNEL_BY_REGION_PIVOT: &str = "channel_by_region_pivot";
pub const CHANNEL_SHARE_BY_REGION_PIVOT: &str = "channel_share_by_region_pivot";
pub const AVG_PROFIT_BY_CHANNEL: &str = "avg_profit_by_channel";
pub const PRODUCT_SUMMARY: &str = "product_summary";
pub const TOP_PRODUCTS_BY_SALES: &str = "top10_products_by_sales";
pub const TOP_PRODUCTS_BY_PROFIT: &str = "top10_products_by_profit";
pub const TOP_PRODUCTS_BY_MARGIN: &str = "top10_products_by_margin";
pub const TOP_PRODUCTS_BY_FREQUENCY: &str = "top10_products_by_frequency";
pub const TOP_PRODUCTS_BY_AVG_SALE: &str = "top10_products_by_avg_sale";
pub const FOCUS_PRODUCTS_BY_REGION_PIVOT: &str = "top5_products_by_region_pivot";
pub const MONTHLY_SALES_VARIANCE: &str = "monthly_sales_variance";
pub const QUARTERLY_SALES: &str = "quarterly_sales";
pub const QUARTERLY_PROFIT: &str = "quarterly_profit";
pub const REGION_BY_QUARTER_PIVOT: &str = "region_by_quarter_pivot";
pub const REGION_BY_MONTH_PIVOT: &str = "region_by_month_pivot";
pub const FOCUS_PRODUCTS_BY_MONTH_PIVOT: &str = "top5_products_by_month_pivot";
pub const FOCUS_PRODUCTS_BY_QUARTER_PIVOT: &str = "top5_products_by_quarter_pivot";
pub const FOCUS_PRODUCTS_SEASONAL_VARIANCE: &str = "top5_products_seasonal_variance";
pub const FOCUS_PRODUCTS_PEAK_MONTHS: &str = "top5_products_peak_month_distribution";
pub const FOCUS_PRODUCTS_CORRELATION: &str = "top5_products_seasonality_correlation";
pub const REGION_ORDER_VALUE: &str = "region_order_value";

/// Every name a full run produces
pub const ALL_REPORTS: [&str; 27] = [
    SALES_BY_REGION,
    SALES_BY_YEAR_REGION,
    REGION_HOUSEHOLD_METRICS,
    PROFIT_PER_SALE_BY_REGION,
    BEST_REGION_BY_AVG_PROFIT,
    CHANNEL_SALES_COUNT,
    CHANNEL_BY_REGION_PIVOT,
    CHANNEL_SHARE_BY_REGION_PIVOT,
    AVG_PROFIT_BY_CHANNEL,
    PRODUCT_SUMMARY,
    TOP_PRODUCTS_BY_SALES,
    TOP_PRODUCTS_BY_PROFIT,
    TOP_PRODUCTS_BY_MARGIN,
    TOP_PRODUCTS_BY_FREQUENCY,
    TOP_PRODUCTS_BY_AVG_SALE,
    FOCUS_PRODUCTS_BY_REGION_PIVOT,
    MONTHLY_SALES_VARIANCE,
    QUARTERLY_SALES,
    QUARTERLY_PROFIT,
    REGION_BY_QUARTER_PIVOT,
    REGION_BY_MONTH_PIVOT,
    FOCUS_PRODUCTS_BY_MONTH_PIVOT,
    FOCUS_PRODUCTS_BY_QUARTER_PIVOT,
    FOCUS_PRODUCTS_SEASONAL_VARIANCE,
    FOCUS_PRODUCTS_PEAK_MONTHS,
    FOCUS_PRODUCTS_CORRELATION,
    REGION_ORDER_VALUE,
];

// ============================================================================
// REPORT BATTERY
// ============================================================================

pub struct ReportBattery<'a> {
    rows: &'a [DerivedTransaction],
    top_n: usize,
    focus_products: usize,
}

impl<'a> ReportBattery<'a> {
    pub fn new(rows: &'a [DerivedTransaction], config: &PipelineConfig) -> Self {
        ReportBattery {
            rows,
            top_n: config.top_n,
            focus_products: config.focus_products,
        }
    }

    pub fn run(&self) -> ResultBundle {
        let mut bundle = ResultBundle::new();

        self.region_reports(&mut bundle);
        self.channel_reports(&mut bundle);
        let focus = self.product_reports(&mut bundle);
        self.calendar_reports(&mut bundle);
        self.focus_product_reports(&mut bundle, focus);
        bundle.insert(REGION_ORDER_VALUE, self.region_order_value().map(ReportTable::Grouped));

        let failures = bundle.failures().len();
        if failures > 0 {
            log::warn!("{} of {} reports failed", failures, bundle.len());
        } else {
            log::info!("computed {} reports over {} fact rows", bundle.len(), self.rows.len());
        }
        bundle
    }

    fn grouped(&self, spec: &AggregateSpec) -> AggregateTable {
        aggregate(self.rows, spec)
    }

    // ------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------

    fn region_reports(&self, bundle: &mut ResultBundle) {
        bundle.insert(SALES_BY_REGION, self.sales_by_region().map(ReportTable::Grouped));

        let by_year = self
            .grouped(&AggregateSpec::group_by(&[GroupKey::Year, GroupKey::Region]).sum(Field::Revenue, "revenue"))
            .sorted_by_keys();
        bundle.insert(SALES_BY_YEAR_REGION, Ok(ReportTable::Grouped(by_year)));

        bundle.insert(
            REGION_HOUSEHOLD_METRICS,
            self.region_household_metrics().map(ReportTable::Grouped),
        );

        let per_sale = self.profit_per_sale_by_region();
        bundle.insert(
            BEST_REGION_BY_AVG_PROFIT,
            dependent(&per_sale, PROFIT_PER_SALE_BY_REGION, |t| {
                rank::top_n(t, "avg_profit", 1, Direction::Largest).map(ReportTable::Grouped)
            }),
        );
        bundle.insert(PROFIT_PER_SALE_BY_REGION, per_sale.map(ReportTable::Grouped));
    }

    fn sales_by_region(&self) -> PipelineResult<AggregateTable> {
        let table = self.grouped(&AggregateSpec::group_by(&[GroupKey::Region]).sum(Field::Revenue, "revenue"));
        rank::sort_by(&table, "revenue", Direction::Largest)
    }

    fn region_household_metrics(&self) -> PipelineResult<AggregateTable> {
        let spec = AggregateSpec::group_by(&[GroupKey::Region])
            .sum(Field::Revenue, "revenue")
            .sum(Field::Profit, "profit")
            .metric(Field::Households, Reduction::First, "households");

        let table = self
            .grouped(&spec)
            .with_derived_column("revenue_per_household", &["revenue", "households"], |v| v[0].ratio(v[1]))?
            .with_derived_column("profit_per_household", &["profit", "households"], |v| v[0].ratio(v[1]))?;

        rank::sort_by(&table, "revenue", Direction::Largest)
    }

    fn profit_per_sale_by_region(&self) -> PipelineResult<AggregateTable> {
        let spec = AggregateSpec::group_by(&[GroupKey::Region])
            .mean(Field::Profit, "avg_profit")
            .mean(Field::Revenue, "avg_revenue")
            .mean(Field::UnitCost, "avg_cost");

        let table = self
            .grouped(&spec)
            .with_derived_column("profit_margin_pct", &["avg_profit", "avg_revenue"], margin)?;

        rank::sort_by(&table, "avg_profit", Direction::Largest)
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    fn channel_reports(&self, bundle: &mut ResultBundle) {
        let counts = self.grouped(&AggregateSpec::group_by(&[GroupKey::Channel]).count(Field::Revenue, "sales"));
        bundle.insert(
            CHANNEL_SALES_COUNT,
            rank::sort_by(&counts, "sales", Direction::Largest).map(ReportTable::Grouped),
        );

        let by_region = pivot(
            &self.grouped(&AggregateSpec::group_by(&[GroupKey::Region, GroupKey::Channel]).sum(Field::Revenue, "revenue")),
            "revenue",
        );
        bundle.insert(
            CHANNEL_SHARE_BY_REGION_PIVOT,
            dependent(&by_region, CHANNEL_BY_REGION_PIVOT, |p| Ok(ReportTable::Pivot(p.percent_of_row()))),
        );
        bundle.insert(CHANNEL_BY_REGION_PIVOT, by_region.map(ReportTable::Pivot));

        let avg_profit = self
            .grouped(&AggregateSpec::group_by(&[GroupKey::Channel]).mean(Field::Profit, "avg_profit"))
            .sorted_by_keys();
        bundle.insert(AVG_PROFIT_BY_CHANNEL, Ok(ReportTable::Grouped(avg_profit)));
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    /// Product rankings; returns the focus list shared by the product seasonality reports
    fn product_reports(&self, bundle: &mut ResultBundle) -> PipelineResult<Vec<KeyValue>> {
        let summary = self.product_summary();

        let rankings = [
            (TOP_PRODUCTS_BY_SALES, "revenue"),
            (TOP_PRODUCTS_BY_PROFIT, "profit"),
            (TOP_PRODUCTS_BY_MARGIN, "profit_margin_pct"),
            (TOP_PRODUCTS_BY_FREQUENCY, "sales"),
            (TOP_PRODUCTS_BY_AVG_SALE, "avg_revenue"),
        ];
        for (name, column) in rankings {
            bundle.insert(
                name,
                dependent(&summary, PRODUCT_SUMMARY, |t| {
                    let ranked = rank::top_n(&t.select(&[column])?, column, self.top_n, Direction::Largest)?;
                    Ok(ReportTable::Grouped(ranked))
                }),
            );
        }

        let focus = match &summary {
            Ok(t) => rank::top_keys(t, "revenue", self.focus_products, Direction::Largest),
            Err(_) => Err(PipelineError::DependencyFailed {
                report: PRODUCT_SUMMARY.to_string(),
            }),
        };
        if let Ok(products) = &focus {
            log::debug!(
                "focus products: {}",
                products.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
            );
        }

        // rankings above read first-seen order; only the stored copy is sorted
        let stored = summary.and_then(|t| rank::sort_by(&t, "revenue", Direction::Largest));
        bundle.insert(PRODUCT_SUMMARY, stored.map(ReportTable::Grouped));
        focus
    }

    fn product_summary(&self) -> PipelineResult<AggregateTable> {
        let spec = AggregateSpec::group_by(&[GroupKey::ProductName])
            .sum(Field::Revenue, "revenue")
            .sum(Field::Profit, "profit")
            .mean(Field::Profit, "avg_profit")
            .mean(Field::Revenue, "avg_revenue")
            .count(Field::Revenue, "sales");

        self.grouped(&spec)
            .with_derived_column("profit_margin_pct", &["avg_profit", "avg_revenue"], margin)
    }

    fn focus_product_reports(&self, bundle: &mut ResultBundle, focus: PipelineResult<Vec<KeyValue>>) {
        let product_pivot = |column_key: GroupKey| -> PipelineResult<PivotTable> {
            let products = focus.as_ref().map_err(|_| PipelineError::DependencyFailed {
                report: PRODUCT_SUMMARY.to_string(),
            })?;
            let rows = self
                .rows
                .iter()
                .filter(|row| products.contains(&GroupKey::ProductName.extract(row)));

            let spec = AggregateSpec::group_by(&[GroupKey::ProductName, column_key]).sum(Field::Revenue, "revenue");
            let table = pivot(&aggregate(rows, &spec), "revenue")?;
            Ok(table.restrict_rows(products))
        };

        bundle.insert(
            FOCUS_PRODUCTS_BY_REGION_PIVOT,
            product_pivot(GroupKey::Region).map(ReportTable::Pivot),
        );
        bundle.insert(
            FOCUS_PRODUCTS_BY_QUARTER_PIVOT,
            product_pivot(GroupKey::Quarter).map(ReportTable::Pivot),
        );

        let by_month = product_pivot(GroupKey::Month);
        let series: PipelineResult<Vec<(KeyValue, MonthlySeries)>> = match &by_month {
            Ok(p) => p
                .row_labels
                .iter()
                .map(|label| -> PipelineResult<(KeyValue, MonthlySeries)> {
                    Ok((label.clone(), MonthlySeries::from_pivot_row(p, label)?))
                })
                .collect(),
            Err(_) => Err(PipelineError::DependencyFailed {
                report: FOCUS_PRODUCTS_BY_MONTH_PIVOT.to_string(),
            }),
        };

        let comparison: PipelineResult<SeasonalComparison> = match &series {
            Ok(s) => Ok(SeasonalComparison::from_series(s)),
            Err(_) => Err(PipelineError::DependencyFailed {
                report: FOCUS_PRODUCTS_BY_MONTH_PIVOT.to_string(),
            }),
        };
        bundle.insert(
            FOCUS_PRODUCTS_PEAK_MONTHS,
            dependent(&comparison, FOCUS_PRODUCTS_SEASONAL_VARIANCE, |c| {
                Ok(ReportTable::Grouped(peak_month_table(c)))
            }),
        );
        bundle.insert(
            FOCUS_PRODUCTS_CORRELATION,
            dependent(&series, FOCUS_PRODUCTS_BY_MONTH_PIVOT, |s| {
                Ok(ReportTable::Correlation(correlation_matrix(s)))
            }),
        );
        bundle.insert(
            FOCUS_PRODUCTS_SEASONAL_VARIANCE,
            comparison.map(ReportTable::SeasonalComparison),
        );
        bundle.insert(FOCUS_PRODUCTS_BY_MONTH_PIVOT, by_month.map(ReportTable::Pivot));
    }

    // ------------------------------------------------------------------
    // Calendar
    // ------------------------------------------------------------------

    fn calendar_reports(&self, bundle: &mut ResultBundle) {
        let monthly = self.grouped(&AggregateSpec::group_by(&[GroupKey::Month]).sum(Field::Revenue, "revenue"));
        bundle.insert(
            MONTHLY_SALES_VARIANCE,
            MonthlySeries::from_table(&monthly, "revenue").map(|s| ReportTable::Seasonal(seasonal_profile(&s))),
        );

        let quarterly = self
            .grouped(
                &AggregateSpec::group_by(&[GroupKey::Quarter])
                    .sum(Field::Revenue, "revenue")
                    .sum(Field::Profit, "profit"),
            )
            .sorted_by_keys();
        bundle.insert(QUARTERLY_SALES, quarterly.select(&["revenue"]).map(ReportTable::Grouped));
        bundle.insert(QUARTERLY_PROFIT, quarterly.select(&["profit"]).map(ReportTable::Grouped));

        let by_quarter = self
            .grouped(&AggregateSpec::group_by(&[GroupKey::Region, GroupKey::Quarter]).sum(Field::Revenue, "revenue"));
        bundle.insert(
            REGION_BY_QUARTER_PIVOT,
            pivot(&by_quarter, "revenue").map(ReportTable::Pivot),
        );

        let by_month = self
            .grouped(&AggregateSpec::group_by(&[GroupKey::Region, GroupKey::Month]).sum(Field::Revenue, "revenue"));
        bundle.insert(REGION_BY_MONTH_PIVOT, pivot(&by_month, "revenue").map(ReportTable::Pivot));
    }

    // ------------------------------------------------------------------
    // Order value
    // ------------------------------------------------------------------

    fn region_order_value(&self) -> PipelineResult<AggregateTable> {
        let spec = AggregateSpec::group_by(&[GroupKey::Region])
            .mean(Field::Revenue, "avg_order_value")
            .metric(Field::OrderNumber, Reduction::CountDistinct, "orders")
            .metric(Field::Households, Reduction::First, "households");

        let table = self
            .grouped(&spec)
            .with_derived_column("orders_per_household", &["orders", "households"], |v| v[0].ratio(v[1]))?
            .with_derived_column(
                "revenue_per_household",
                &["orders_per_household", "avg_order_value"],
                |v| v[0].times(v[1]),
            )?
            .with_derived_column(
                "efficiency",
                &["revenue_per_household", "orders_per_household"],
                |v| v[0].ratio(v[1]),
            )?;

        rank::sort_by(&table, "revenue_per_household", Direction::Largest)
    }
}

/// Run the whole battery over derived fact rows
pub fn run_reports(rows: &[DerivedTransaction], config: &PipelineConfig) -> ResultBundle {
    ReportBattery::new(rows, config).run()
}

fn margin(values: &[Measure]) -> Measure {
    match (values[0].value(), values[1].value()) {
        (Some(profit), Some(revenue)) => metrics::profit_margin_percent(profit, revenue),
        _ => Measure::NotComputable,
    }
}

/// Report built from another report's table; fails when the upstream failed
fn dependent<T, F>(upstream: &PipelineResult<T>, upstream_name: &str, build: F) -> PipelineResult<ReportTable>
where
    F: FnOnce(&T) -> PipelineResult<ReportTable>,
{
    match upstream {
        Ok(table) => build(table),
        Err(_) => Err(PipelineError::DependencyFailed {
            report: upstream_name.to_string(),
        }),
    }
}

fn peak_month_table(comparison: &SeasonalComparison) -> AggregateTable {
    let rows = comparison
        .peak_month_distribution()
        .into_iter()
        .map(|(month, count): (Month, usize)| AggregateRow {
            keys: vec![KeyValue::Month(month)],
            values: vec![Measure::Value(count as f64)],
        })
        .collect();

    AggregateTable {
        key_columns: vec![GroupKey::Month],
        columns: vec!["products".to_string()],
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::row;

    fn facts() -> Vec<DerivedTransaction> {
        vec![
            row("SO-1", "2018-01-10", "Wholesale", Some("West"), Some("Widget"), 100.0, 60.0, Some(1000)),
            row("SO-1", "2018-01-10", "Wholesale", Some("West"), Some("Gadget"), 200.0, 100.0, Some(500)),
            row("SO-2", "2018-12-01", "Export", Some("East"), Some("Widget"), 100.0, 50.0, Some(0)),
            row("SO-3", "2019-06-15", "Export", None, Some("Gizmo"), 40.0, 10.0, None),
        ]
    }

    fn run() -> ResultBundle {
        run_reports(&facts(), &PipelineConfig::default())
    }

    #[test]
    fn test_region_households_take_first_row_value() {
        // West rows carry 1000 (CA) then 500 (OR): the first value is kept, never summed
        let bundle = run();
        let table = bundle.grouped(REGION_HOUSEHOLD_METRICS).unwrap();

        assert_eq!(table.value(&[KeyValue::text("West")], "households").unwrap(), Some(Measure::Value(1000.0)));
        assert_eq!(table.value(&[KeyValue::Unknown], "households").unwrap(), Some(Measure::NotComputable));

        let order_value = bundle.grouped(REGION_ORDER_VALUE).unwrap();
        assert_eq!(
            order_value.value(&[KeyValue::text("West")], "households").unwrap(),
            Some(Measure::Value(1000.0))
        );
    }

    #[test]
    fn test_battery_produces_every_report() {
        let bundle = run();

        for name in ALL_REPORTS {
            assert!(bundle.get(name).is_some(), "missing report {}", name);
        }
        assert_eq!(bundle.len(), ALL_REPORTS.len());
        assert!(bundle.failures().is_empty(), "{:?}", bundle.failures());
    }

    #[test]
    fn test_sales_by_region_descending_with_unknown_bucket() {
        let bundle = run();
        let table = bundle.grouped(SALES_BY_REGION).unwrap();

        assert_eq!(table.leading_keys(), vec![KeyValue::text("West"), KeyValue::text("East"), KeyValue::Unknown]);
        assert_eq!(table.value(&[KeyValue::text("West")], "revenue").unwrap(), Some(Measure::Value(300.0)));
        assert_eq!(table.value(&[KeyValue::Unknown], "revenue").unwrap(), Some(Measure::Value(40.0)));
    }

    #[test]
    fn test_zero_household_region_is_not_computable() {
        let bundle = run();
        let table = bundle.grouped(REGION_HOUSEHOLD_METRICS).unwrap();

        let east = [KeyValue::text("East")];
        assert_eq!(table.value(&east, "households").unwrap(), Some(Measure::Value(0.0)));
        assert_eq!(table.value(&east, "revenue_per_household").unwrap(), Some(Measure::NotComputable));

        let west = [KeyValue::text("West")];
        assert_eq!(table.value(&west, "households").unwrap(), Some(Measure::Value(1000.0)));
        assert_eq!(table.value(&west, "revenue_per_household").unwrap(), Some(Measure::Value(0.3)));
    }

    #[test]
    fn test_best_region_by_avg_profit() {
        let bundle = run();
        let best = bundle.grouped(BEST_REGION_BY_AVG_PROFIT).unwrap();

        // West: (40 + 100) / 2 = 70, East: 50, Unknown: 30
        assert_eq!(best.len(), 1);
        assert_eq!(best.rows[0].keys, vec![KeyValue::text("West")]);
        assert_eq!(best.rows[0].values[0], Measure::Value(70.0));
    }

    #[test]
    fn test_channel_share_rows_sum_to_hundred() {
        let bundle = run();
        let share = bundle.pivot(CHANNEL_SHARE_BY_REGION_PIVOT).unwrap();

        for r in 0..share.row_labels.len() {
            assert!((share.row_total(r) - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_focus_products_follow_sales_ranking() {
        let mut config = PipelineConfig::default();
        config.focus_products = 2;
        let bundle = run_reports(&facts(), &config);

        let by_region = bundle.pivot(FOCUS_PRODUCTS_BY_REGION_PIVOT).unwrap();
        // Widget 200, Gadget 200: tie keeps first-seen order
        assert_eq!(by_region.row_labels, vec![KeyValue::text("Widget"), KeyValue::text("Gadget")]);

        let Some(ReportTable::SeasonalComparison(comparison)) = bundle.table(FOCUS_PRODUCTS_SEASONAL_VARIANCE) else {
            panic!("expected a seasonal comparison");
        };
        assert_eq!(comparison.entities.len(), 2);
        assert_eq!(comparison.entities[1].peak_month, Month::January);
    }

    #[test]
    fn test_region_order_value_counts_distinct_orders() {
        let bundle = run();
        let table = bundle.grouped(REGION_ORDER_VALUE).unwrap();
        let west = [KeyValue::text("West")];

        assert_eq!(table.value(&west, "orders").unwrap(), Some(Measure::Value(1.0)));
        assert_eq!(table.value(&west, "avg_order_value").unwrap(), Some(Measure::Value(150.0)));
        assert_eq!(table.value(&[KeyValue::Unknown], "orders_per_household").unwrap(), Some(Measure::NotComputable));
    }

    #[test]
    fn test_empty_fact_table() {
        let bundle = run_reports(&[], &PipelineConfig::default());

        assert!(bundle.grouped(SALES_BY_REGION).unwrap().is_empty());
        assert!(bundle.failures().is_empty(), "{:?}", bundle.failures());
    }

    #[test]
    fn test_total_profit_top_region() {
        let rows = vec![
            row("SO-1", "2018-01-10", "Wholesale", Some("A"), None, 1000.0, 600.0, None),
            row("SO-2", "2018-01-11", "Wholesale", Some("B"), None, 500.0, 400.0, None),
        ];
        let table = aggregate(&rows, &AggregateSpec::group_by(&[GroupKey::Region]).sum(Field::Profit, "profit"));

        assert_eq!(table.value(&[KeyValue::text("A")], "profit").unwrap(), Some(Measure::Value(400.0)));
        assert_eq!(table.value(&[KeyValue::text("B")], "profit").unwrap(), Some(Measure::Value(100.0)));

        let top = rank::top_n(&table, "profit", 1, Direction::Largest).unwrap();
        assert_eq!(top.leading_keys(), vec![KeyValue::text("A")]);
    }

    #[test]
    fn test_product_ranking_ties_keep_first_seen_order() {
        // equal profit; the later product has more revenue
        let rows = vec![
            row("SO-1", "2018-01-10", "Wholesale", Some("West"), Some("A"), 100.0, 50.0, Some(10)),
            row("SO-2", "2018-01-11", "Wholesale", Some("West"), Some("B"), 500.0, 450.0, Some(10)),
        ];
        let bundle = run_reports(&rows, &PipelineConfig::default());

        let by_profit = bundle.grouped(TOP_PRODUCTS_BY_PROFIT).unwrap();
        assert_eq!(by_profit.leading_keys(), vec![KeyValue::text("A"), KeyValue::text("B")]);

        let summary = bundle.grouped(PRODUCT_SUMMARY).unwrap();
        assert_eq!(summary.leading_keys(), vec![KeyValue::text("B"), KeyValue::text("A")]);
    }

    #[test]
    fn test_sale_counts_include_blank_order_numbers() {
        let rows = vec![
            row("SO-1", "2018-01-10", "Wholesale", Some("West"), Some("Widget"), 10.0, 5.0, Some(10)),
            row("", "2018-01-11", "Wholesale", Some("West"), Some("Widget"), 20.0, 5.0, Some(10)),
        ];
        let bundle = run_reports(&rows, &PipelineConfig::default());

        let channels = bundle.grouped(CHANNEL_SALES_COUNT).unwrap();
        assert_eq!(channels.value(&[KeyValue::text("Wholesale")], "sales").unwrap(), Some(Measure::Value(2.0)));

        let frequency = bundle.grouped(TOP_PRODUCTS_BY_FREQUENCY).unwrap();
        assert_eq!(frequency.value(&[KeyValue::text("Widget")], "sales").unwrap(), Some(Measure::Value(2.0)));
    }
}
