mod config;
pub mod builder;
pub mod manual;
pub mod quick_start;
pub mod store;
pub mod workflow;

use log::{debug, info};

use std::collections::{HashMap, HashSet};

pub use crate::config::*;

// **** Aggregation ****

// Rounds at the 0.01 unit, half away from zero.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn reduce(values: &[f64], mode: AggregationMode) -> AggregateOutcome {
    let count = values.len();
    if count == 0 {
        return AggregateOutcome { value: None, count: 0 };
    }
    let value = match mode {
        AggregationMode::Sum => Some(round2(values.iter().sum())),
        AggregationMode::Avg => Some(round2(values.iter().sum::<f64>() / count as f64)),
        // Input order is the store contract: newest submission first.
        AggregationMode::Latest => Some(round2(values[0])),
        AggregationMode::Count => Some(count as f64),
        AggregationMode::Append => None,
    };
    AggregateOutcome { value, count }
}

/// Reduces an observation set to one representative value.
///
/// The input is expected to be already scoped to a single indicator and
/// fiscal year (and optionally a period); no further filtering happens
/// here beyond dropping the observations without a numeric value. The
/// function preserves input order and does not sort: `Latest` relies on
/// the store returning observations newest first.
///
/// Empty or all-null input is not an error; it yields an empty value with
/// a zero count, for every mode.
pub fn aggregate(observations: &[Observation], mode: AggregationMode) -> AggregateOutcome {
    let values: Vec<f64> = observations.iter().filter_map(|o| o.value).collect();
    reduce(&values, mode)
}

/// The target rule: met iff both the value and the target exist and the
/// value is at-or-beyond the target in the indicator's direction. No
/// tolerance band.
pub fn meets_target(value: Option<f64>, target: Option<f64>, direction: TargetDirection) -> bool {
    match (value, target) {
        (Some(v), Some(t)) => match direction {
            TargetDirection::AtLeast => v >= t,
            TargetDirection::AtMost => v <= t,
        },
        _ => false,
    }
}

/// Year-over-year movement with a 1% noise-tolerance band: `Up` above
/// prior * 1.01, `Down` below prior * 0.99, `Flat` in between or when
/// either side has no data.
pub fn trend_between(current: Option<f64>, prior: Option<f64>) -> Trend {
    match (current, prior) {
        (Some(c), Some(p)) => {
            if c > p * 1.01 {
                Trend::Up
            } else if c < p * 0.99 {
                Trend::Down
            } else {
                Trend::Flat
            }
        }
        _ => Trend::Flat,
    }
}

// **** Scorecard builder ****

// Numeric values of one indicator, preserving input order.
fn values_for<'a>(by_indicator: &HashMap<&'a str, Vec<f64>>, indicator_id: &str) -> Vec<f64> {
    by_indicator.get(indicator_id).cloned().unwrap_or_default()
}

fn group_values<'a>(observations: &'a [Observation]) -> HashMap<&'a str, Vec<f64>> {
    let mut grouped: HashMap<&str, Vec<f64>> = HashMap::new();
    for obs in observations {
        let entry = grouped.entry(obs.indicator_id.as_str()).or_default();
        if let Some(v) = obs.value {
            entry.push(v);
        }
    }
    grouped
}

// Presence counts per indicator: null-valued observations count here even
// though they never enter the numeric reduction.
fn count_orphans(catalog: &Catalog, observations: &[Observation]) -> usize {
    let known: HashSet<&str> = catalog.iter().map(|i| i.indicator_id.as_str()).collect();
    observations
        .iter()
        .filter(|o| !known.contains(o.indicator_id.as_str()))
        .count()
}

/// Builds the annual scorecard: one row per catalog indicator, grouped by
/// category in insertion order of first encounter, with per-category and
/// faculty-wide rollups.
///
/// `current` and `prior` are the observation sets of the reporting year
/// and of the comparison year. The prior year is reduced with the same
/// aggregation mode as the current year, for comparability. Observations
/// referencing an indicator that is not in the catalog are ignored.
pub fn build_scorecard(
    catalog: &Catalog,
    current: &[Observation],
    prior: &[Observation],
) -> ScorecardReport {
    info!(
        "build_scorecard: {} indicators, {} current / {} prior observations",
        catalog.len(),
        current.len(),
        prior.len()
    );
    let orphans = count_orphans(catalog, current) + count_orphans(catalog, prior);
    if orphans > 0 {
        debug!("build_scorecard: ignoring {} observations with unknown indicators", orphans);
    }

    let current_values = group_values(current);
    let prior_values = group_values(prior);

    let mut categories: Vec<CategoryScorecard> = Vec::new();
    let mut summary = Rollup::default();

    for indicator in catalog.iter() {
        let outcome = reduce(
            &values_for(&current_values, &indicator.indicator_id),
            indicator.aggregation,
        );
        let prior_outcome = reduce(
            &values_for(&prior_values, &indicator.indicator_id),
            indicator.aggregation,
        );
        let met = meets_target(outcome.value, indicator.target_value, indicator.target_direction);
        let row = Scorecard {
            indicator_id: indicator.indicator_id.clone(),
            value: outcome.value,
            target: indicator.target_value,
            met,
            entry_count: outcome.count,
            trend: trend_between(outcome.value, prior_outcome.value),
        };

        summary.total += 1;
        if row.value.is_none() {
            summary.no_data += 1;
        } else if indicator.target_value.is_some() {
            if met {
                summary.met += 1;
            } else {
                summary.not_met += 1;
            }
        }

        let idx = match categories
            .iter()
            .position(|c| c.category_id == indicator.category_id)
        {
            Some(idx) => idx,
            None => {
                categories.push(CategoryScorecard {
                    category_id: indicator.category_id.clone(),
                    rows: Vec::new(),
                    rollup: Rollup::default(),
                });
                categories.len() - 1
            }
        };
        let category = &mut categories[idx];
        category.rollup.total += 1;
        if row.value.is_none() {
            category.rollup.no_data += 1;
        } else if indicator.target_value.is_some() {
            if met {
                category.rollup.met += 1;
            } else {
                category.rollup.not_met += 1;
            }
        }
        category.rows.push(row);
    }

    ScorecardReport { categories, summary }
}

// **** Reporting reductions ****

/// Aggregated value and entry count for every indicator of one category,
/// in catalog order.
pub fn category_overview(
    catalog: &Catalog,
    category_id: &str,
    observations: &[Observation],
) -> Vec<OverviewRow> {
    let grouped = group_values(observations);
    catalog
        .by_category(category_id)
        .iter()
        .map(|indicator| {
            let outcome = reduce(
                &values_for(&grouped, &indicator.indicator_id),
                indicator.aggregation,
            );
            OverviewRow {
                indicator_id: indicator.indicator_id.clone(),
                value: outcome.value,
                entry_count: outcome.count,
            }
        })
        .collect()
}

/// Per-fiscal-year series for one indicator, reduced with the indicator's
/// own mode. Years are either the requested ones (in the given order) or
/// the years present in the data, ascending.
pub fn trend_series(
    indicator: &Indicator,
    observations: &[Observation],
    years: Option<&[i32]>,
) -> Vec<TrendPoint> {
    let mut by_year: HashMap<i32, Vec<f64>> = HashMap::new();
    for obs in observations {
        if obs.indicator_id != indicator.indicator_id {
            continue;
        }
        let entry = by_year.entry(obs.fiscal_year).or_default();
        if let Some(v) = obs.value {
            entry.push(v);
        }
    }

    let year_list: Vec<i32> = match years {
        Some(ys) => ys.to_vec(),
        None => {
            let mut ys: Vec<i32> = by_year.keys().cloned().collect();
            ys.sort_unstable();
            ys
        }
    };

    year_list
        .iter()
        .map(|year| {
            let values = by_year.get(year).cloned().unwrap_or_default();
            TrendPoint {
                year: *year,
                value: reduce(&values, indicator.aggregation).value,
                target: indicator.target_value,
            }
        })
        .collect()
}

/// Breakdown by dimension value: the mean of the numeric observations per
/// dimension value, in order of first encounter. Observations without a
/// dimension value or without a numeric value are skipped.
pub fn dimension_matrix(observations: &[Observation]) -> Vec<MatrixPoint> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<f64>> = HashMap::new();
    for obs in observations {
        let (Some(dv), Some(v)) = (&obs.dimension_value, obs.value) else {
            continue;
        };
        if !grouped.contains_key(dv) {
            order.push(dv.clone());
        }
        grouped.entry(dv.clone()).or_default().push(v);
    }
    order
        .into_iter()
        .map(|dv| {
            let values = &grouped[&dv];
            MatrixPoint {
                value: round2(values.iter().sum::<f64>() / values.len() as f64),
                count: values.len(),
                dimension_value: dv,
            }
        })
        .collect()
}

/// The distinct fiscal years, periods and dimensions present in an
/// observation set, each sorted ascending.
pub fn available_filters(observations: &[Observation]) -> AvailableFilters {
    let mut years: Vec<i32> = Vec::new();
    let mut periods: Vec<String> = Vec::new();
    let mut dimensions: Vec<String> = Vec::new();
    for obs in observations {
        if !years.contains(&obs.fiscal_year) {
            years.push(obs.fiscal_year);
        }
        if !obs.period.is_empty() && !periods.contains(&obs.period) {
            periods.push(obs.period.clone());
        }
        if let Some(d) = &obs.dimension {
            if !dimensions.contains(d) {
                dimensions.push(d.clone());
            }
        }
    }
    years.sort_unstable();
    periods.sort();
    dimensions.sort();
    AvailableFilters { years, periods, dimensions }
}

/// The multi-year export table: for every fiscal year present, the
/// aggregate of every catalog indicator that has numeric data that year,
/// in catalog order.
pub fn summary_by_year(catalog: &Catalog, observations: &[Observation]) -> Vec<YearSummary> {
    let mut years: Vec<i32> = Vec::new();
    for obs in observations {
        if !years.contains(&obs.fiscal_year) {
            years.push(obs.fiscal_year);
        }
    }
    years.sort_unstable();

    years
        .into_iter()
        .map(|year| {
            let scoped: Vec<Observation> = observations
                .iter()
                .filter(|o| o.fiscal_year == year)
                .cloned()
                .collect();
            let grouped = group_values(&scoped);
            let values = catalog
                .iter()
                .filter_map(|indicator| {
                    let outcome = reduce(
                        &values_for(&grouped, &indicator.indicator_id),
                        indicator.aggregation,
                    );
                    outcome.value.map(|v| (indicator.indicator_id.clone(), v))
                })
                .collect();
            YearSummary { year, values }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(indicator_id: &str, fiscal_year: i32, value: Option<f64>) -> Observation {
        Observation {
            id: String::new(),
            indicator_id: indicator_id.to_string(),
            fiscal_year,
            period: "annual".to_string(),
            value,
            target: None,
            dimension: None,
            dimension_value: None,
            unit: String::new(),
            notes: String::new(),
            submitted_by: "staff@vet.example".to_string(),
            submitted_at: "2567-10-01T09:00:00Z".to_string(),
            status: EntryStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            deleted_by: None,
            deleted_at: None,
            previous_status: None,
            resubmission_of: None,
        }
    }

    fn indicator(id: &str, category: &str, mode: AggregationMode, target: Option<f64>) -> Indicator {
        Indicator {
            indicator_id: id.to_string(),
            category_id: category.to_string(),
            name_local: format!("ตัวชี้วัด {}", id),
            name_en: format!("Indicator {}", id),
            unit: "percent".to_string(),
            target_value: target,
            target_direction: TargetDirection::AtLeast,
            aggregation: mode,
            frequency: "annual".to_string(),
            department_id: "dean".to_string(),
        }
    }

    #[test]
    fn aggregate_sum_skips_nulls() {
        let entries = vec![
            obs("Y", 2567, Some(100.0)),
            obs("Y", 2567, None),
            obs("Y", 2567, Some(50.0)),
        ];
        let outcome = aggregate(&entries, AggregationMode::Sum);
        assert_eq!(outcome.value, Some(150.0));
        assert_eq!(outcome.count, 2);
    }

    #[test]
    fn aggregate_avg_rounds_to_two_decimals() {
        let entries = vec![
            obs("X", 2567, Some(1.0)),
            obs("X", 2567, Some(1.0)),
            obs("X", 2567, Some(2.0)),
        ];
        let outcome = aggregate(&entries, AggregationMode::Avg);
        assert_eq!(outcome.value, Some(1.33));
        assert_eq!(outcome.count, 3);
    }

    #[test]
    fn aggregate_empty_input_is_null_for_every_mode() {
        let no_entries: Vec<Observation> = vec![];
        let all_null = vec![obs("X", 2567, None), obs("X", 2567, None)];
        for mode in [
            AggregationMode::Sum,
            AggregationMode::Avg,
            AggregationMode::Latest,
            AggregationMode::Count,
            AggregationMode::Append,
        ] {
            let a = aggregate(&no_entries, mode);
            assert_eq!((a.value, a.count), (None, 0));
            let b = aggregate(&all_null, mode);
            assert_eq!((b.value, b.count), (None, 0));
        }
    }

    #[test]
    fn aggregate_latest_takes_the_first_in_input_order() {
        let entries = vec![
            obs("X", 2567, Some(88.0)),
            obs("X", 2567, Some(70.0)),
            obs("X", 2567, Some(90.0)),
        ];
        let outcome = aggregate(&entries, AggregationMode::Latest);
        assert_eq!(outcome.value, Some(88.0));
    }

    #[test]
    fn aggregate_count_reports_the_count_as_value() {
        let entries = vec![
            obs("X", 2567, Some(1.0)),
            obs("X", 2567, None),
            obs("X", 2567, Some(3.0)),
        ];
        let outcome = aggregate(&entries, AggregationMode::Count);
        assert_eq!(outcome.value, Some(2.0));
        assert_eq!(outcome.count, 2);
    }

    #[test]
    fn aggregate_append_has_no_numeric_value() {
        let entries = vec![obs("X", 2567, Some(1.0)), obs("X", 2567, Some(2.0))];
        let outcome = aggregate(&entries, AggregationMode::Append);
        assert_eq!(outcome.value, None);
        assert_eq!(outcome.count, 2);
    }

    #[test]
    fn met_requires_both_value_and_target() {
        assert!(meets_target(Some(80.0), Some(80.0), TargetDirection::AtLeast));
        assert!(meets_target(Some(81.0), Some(80.0), TargetDirection::AtLeast));
        assert!(!meets_target(Some(79.9), Some(80.0), TargetDirection::AtLeast));
        assert!(!meets_target(None, Some(80.0), TargetDirection::AtLeast));
        assert!(!meets_target(Some(80.0), None, TargetDirection::AtLeast));
        assert!(!meets_target(None, None, TargetDirection::AtLeast));
    }

    #[test]
    fn met_inverts_for_minimization_targets() {
        assert!(meets_target(Some(0.0), Some(3.0), TargetDirection::AtMost));
        assert!(meets_target(Some(3.0), Some(3.0), TargetDirection::AtMost));
        assert!(!meets_target(Some(4.0), Some(3.0), TargetDirection::AtMost));
    }

    #[test]
    fn trend_band_is_one_percent() {
        assert_eq!(trend_between(Some(80.0), Some(70.0)), Trend::Up);
        assert_eq!(trend_between(Some(100.5), Some(100.0)), Trend::Flat);
        assert_eq!(trend_between(Some(98.9), Some(100.0)), Trend::Down);
        assert_eq!(trend_between(Some(80.0), None), Trend::Flat);
        assert_eq!(trend_between(None, Some(80.0)), Trend::Flat);
    }

    #[test]
    fn scorecard_avg_indicator_meets_its_target() {
        let catalog = Catalog::new(vec![indicator("X", "7.1", AggregationMode::Avg, Some(80.0))]);
        let current = vec![obs("X", 2567, Some(70.0)), obs("X", 2567, Some(90.0))];
        let report = build_scorecard(&catalog, &current, &[]);
        let row = &report.categories[0].rows[0];
        assert_eq!(row.value, Some(80.0));
        assert_eq!(row.entry_count, 2);
        assert!(row.met);
        assert_eq!(row.trend, Trend::Flat);
        assert_eq!(report.summary.met, 1);
    }

    #[test]
    fn scorecard_without_target_is_never_met() {
        let catalog = Catalog::new(vec![indicator("Y", "7.2", AggregationMode::Sum, None)]);
        let current = vec![
            obs("Y", 2567, Some(100.0)),
            obs("Y", 2567, None),
            obs("Y", 2567, Some(50.0)),
        ];
        let report = build_scorecard(&catalog, &current, &[]);
        let row = &report.categories[0].rows[0];
        assert_eq!(row.value, Some(150.0));
        assert_eq!(row.entry_count, 2);
        assert!(!row.met);
        // Track-only with data: neither met, not-met nor no-data.
        assert_eq!(report.summary.met, 0);
        assert_eq!(report.summary.not_met, 0);
        assert_eq!(report.summary.no_data, 0);
        assert_eq!(report.summary.total, 1);
    }

    #[test]
    fn scorecard_trend_uses_the_prior_year_with_the_same_mode() {
        let catalog = Catalog::new(vec![indicator("Z", "7.4", AggregationMode::Avg, None)]);
        let current = vec![obs("Z", 2567, Some(80.0))];
        let prior = vec![obs("Z", 2566, Some(60.0)), obs("Z", 2566, Some(80.0))];
        let report = build_scorecard(&catalog, &current, &prior);
        // prior avg 70, band 70.7: current 80 is up.
        assert_eq!(report.categories[0].rows[0].trend, Trend::Up);
    }

    #[test]
    fn scorecard_groups_categories_in_first_encounter_order() {
        let catalog = Catalog::new(vec![
            indicator("b1", "7.2", AggregationMode::Avg, None),
            indicator("a1", "7.1", AggregationMode::Avg, None),
            indicator("b2", "7.2", AggregationMode::Avg, None),
        ]);
        let report = build_scorecard(&catalog, &[], &[]);
        let ids: Vec<&str> = report.categories.iter().map(|c| c.category_id.as_str()).collect();
        assert_eq!(ids, vec!["7.2", "7.1"]);
        assert_eq!(report.categories[0].rows.len(), 2);
        assert_eq!(report.summary.no_data, 3);
    }

    #[test]
    fn scorecard_ignores_unknown_indicators() {
        let catalog = Catalog::new(vec![indicator("X", "7.1", AggregationMode::Sum, None)]);
        let current = vec![obs("X", 2567, Some(5.0)), obs("ghost", 2567, Some(99.0))];
        let report = build_scorecard(&catalog, &current, &[]);
        assert_eq!(report.categories.len(), 1);
        assert_eq!(report.categories[0].rows[0].value, Some(5.0));
    }

    #[test]
    fn overview_lists_one_category_in_catalog_order() {
        let catalog = Catalog::new(vec![
            indicator("a1", "7.1", AggregationMode::Sum, None),
            indicator("b1", "7.2", AggregationMode::Avg, None),
            indicator("a2", "7.1", AggregationMode::Count, None),
        ]);
        let entries = vec![
            obs("a2", 2567, Some(1.0)),
            obs("a1", 2567, Some(2.0)),
            obs("a1", 2567, Some(3.0)),
        ];
        let rows = category_overview(&catalog, "7.1", &entries);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].indicator_id, "a1");
        assert_eq!(rows[0].value, Some(5.0));
        assert_eq!(rows[1].value, Some(1.0));
    }

    #[test]
    fn trend_series_discovers_years_ascending() {
        let ind = indicator("X", "7.1", AggregationMode::Avg, Some(80.0));
        let entries = vec![
            obs("X", 2567, Some(90.0)),
            obs("X", 2565, Some(70.0)),
            obs("X", 2566, None),
            obs("other", 2565, Some(5.0)),
        ];
        let series = trend_series(&ind, &entries, None);
        let years: Vec<i32> = series.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2565, 2566, 2567]);
        assert_eq!(series[0].value, Some(70.0));
        assert_eq!(series[1].value, None);
        assert_eq!(series[2].target, Some(80.0));
    }

    #[test]
    fn dimension_matrix_averages_per_dimension_value() {
        let mut a = obs("X", 2567, Some(10.0));
        a.dimension_value = Some("Bangkhen".to_string());
        let mut b = obs("X", 2567, Some(20.0));
        b.dimension_value = Some("Bangkhen".to_string());
        let mut c = obs("X", 2567, Some(7.0));
        c.dimension_value = Some("Kamphaeng Saen".to_string());
        let d = obs("X", 2567, Some(99.0));
        let points = dimension_matrix(&[a, b, c, d]);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].dimension_value, "Bangkhen");
        assert_eq!(points[0].value, 15.0);
        assert_eq!(points[0].count, 2);
        assert_eq!(points[1].value, 7.0);
    }

    #[test]
    fn filters_are_distinct_and_sorted() {
        let mut a = obs("X", 2567, Some(1.0));
        a.period = "Q2".to_string();
        a.dimension = Some("campus".to_string());
        let mut b = obs("X", 2565, Some(1.0));
        b.period = "Q1".to_string();
        let mut c = obs("X", 2567, Some(1.0));
        c.period = "Q1".to_string();
        c.dimension = Some("campus".to_string());
        let filters = available_filters(&[a, b, c]);
        assert_eq!(filters.years, vec![2565, 2567]);
        assert_eq!(filters.periods, vec!["Q1".to_string(), "Q2".to_string()]);
        assert_eq!(filters.dimensions, vec!["campus".to_string()]);
    }

    #[test]
    fn summary_by_year_uses_each_indicator_mode() {
        let catalog = Catalog::new(vec![
            indicator("sum1", "7.1", AggregationMode::Sum, None),
            indicator("avg1", "7.1", AggregationMode::Avg, None),
        ]);
        let entries = vec![
            obs("sum1", 2566, Some(10.0)),
            obs("sum1", 2566, Some(20.0)),
            obs("avg1", 2567, Some(40.0)),
            obs("avg1", 2567, Some(60.0)),
        ];
        let summary = summary_by_year(&catalog, &entries);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].year, 2566);
        assert_eq!(summary[0].values, vec![("sum1".to_string(), 30.0)]);
        assert_eq!(summary[1].values, vec![("avg1".to_string(), 50.0)]);
    }
}
