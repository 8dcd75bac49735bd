use log::{debug, info, warn};

use kpi_engine::store::{EntryFilter, EntryStore, InMemoryStore};
use kpi_engine::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::kpi::config_reader::*;

pub mod io_common;
pub mod io_csv;
pub mod io_excel;

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Workbook has no usable worksheet"))]
    EmptyExcel {},
    #[snafu(display("Error opening JSON file"))]
    OpeningJson { source: std::io::Error },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Expected an integer value"))]
    ParsingJsonNumber {},
    #[snafu(display("Missing parent directory for the configuration file"))]
    MissingParentDir {},
    #[snafu(display("Error opening CSV file"))]
    CsvOpen { source: csv::Error },
    #[snafu(display("Error reading a CSV row"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("CSV row {lineno} is too short"))]
    CsvLineTooShort { lineno: usize },
    #[snafu(display("Error writing the report to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;

pub mod config_reader {
    use crate::kpi::*;

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ReportSettings {
        #[serde(rename = "facultyName")]
        pub faculty_name: String,
        #[serde(rename = "fiscalYear")]
        _fiscal_year: Option<JSValue>,
        #[serde(rename = "priorFiscalYear")]
        _prior_fiscal_year: Option<JSValue>,
        #[serde(rename = "outputDirectory")]
        pub output_directory: Option<String>,
    }

    impl ReportSettings {
        pub fn fiscal_year(&self) -> ReportResult<Option<i32>> {
            match &self._fiscal_year {
                None => Ok(None),
                x => Ok(Some(read_js_int(x)? as i32)),
            }
        }

        pub fn prior_fiscal_year(&self) -> ReportResult<Option<i32>> {
            match &self._prior_fiscal_year {
                None => Ok(None),
                x => Ok(Some(read_js_int(x)? as i32)),
            }
        }
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct FileSource {
        pub provider: String,
        #[serde(rename = "filePath")]
        pub file_path: String,
        #[serde(rename = "firstDataRowIndex")]
        _first_data_row_index: Option<JSValue>,
        #[serde(rename = "worksheetName")]
        pub worksheet_name: Option<String>,
    }

    impl FileSource {
        /// A source given directly on the command line with --input.
        pub fn direct(file_path: String, provider: String, worksheet_name: Option<String>) -> FileSource {
            FileSource {
                provider,
                file_path,
                _first_data_row_index: None,
                worksheet_name,
            }
        }

        /// 1-based row index of the first observation row. Defaults to 2,
        /// one header row.
        pub fn first_data_row_index(&self) -> ReportResult<usize> {
            match &self._first_data_row_index {
                None => Ok(2),
                x => {
                    let v = read_js_int(x)?;
                    if v < 1 {
                        whatever!("firstDataRowIndex must be at least 1, got {}", v);
                    }
                    Ok(v as usize)
                }
            }
        }
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct KpiDefinition {
        #[serde(rename = "kpiId")]
        pub kpi_id: String,
        #[serde(rename = "categoryId")]
        pub category_id: String,
        #[serde(rename = "nameLocal")]
        pub name_local: String,
        #[serde(rename = "nameEn")]
        pub name_en: String,
        pub unit: Option<String>,
        #[serde(rename = "targetValue")]
        pub target_value: Option<f64>,
        #[serde(rename = "targetDirection")]
        pub target_direction: Option<String>,
        pub aggregation: String,
        pub frequency: Option<String>,
        #[serde(rename = "departmentId")]
        pub department_id: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct UserDefinition {
        pub email: String,
        pub role: String,
        pub name: Option<String>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct KpiConfig {
        #[serde(rename = "reportSettings")]
        pub report_settings: ReportSettings,
        #[serde(rename = "entryFileSources", default)]
        pub entry_file_sources: Vec<FileSource>,
        pub indicators: Vec<KpiDefinition>,
        pub users: Option<Vec<UserDefinition>>,
    }

    pub fn read_reference(path: String) -> ReportResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        debug!("read_reference: read {} bytes", contents.len());
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }

    pub fn read_js_int(x: &Option<JSValue>) -> ReportResult<i64> {
        match x {
            Some(JSValue::Number(n)) => n.as_i64().context(ParsingJsonNumberSnafu {}),
            Some(JSValue::String(s)) => s.parse::<i64>().ok().context(ParsingJsonNumberSnafu {}),
            _ => None.context(ParsingJsonNumberSnafu {}),
        }
    }
}

/// An observation row, as parsed by the readers.
/// This is before validation against the catalog.
#[derive(PartialEq, Debug, Clone)]
pub struct ParsedEntry {
    pub lineno: usize,
    pub indicator_id: String,
    pub fiscal_year: Option<i32>,
    pub period: String,
    pub value: Option<f64>,
    pub target: Option<f64>,
    pub dimension: Option<String>,
    pub dimension_value: Option<String>,
    pub unit: String,
    pub notes: String,
    pub submitted_by: String,
    pub submitted_at: String,
    pub status: Option<String>,
    pub rejection_reason: Option<String>,
}

// JSON observation files use the field names of the stored documents.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct JsonEntry {
    kpi_id: String,
    fiscal_year: Option<i32>,
    period: Option<String>,
    value: Option<f64>,
    target: Option<f64>,
    dimension: Option<String>,
    dimension_value: Option<String>,
    unit: Option<String>,
    notes: Option<String>,
    submitted_by: Option<String>,
    submitted_at: Option<String>,
    status: Option<String>,
    rejection_reason: Option<String>,
}

fn parse_json_entries(contents: &str) -> ReportResult<Vec<ParsedEntry>> {
    let rows: Vec<JsonEntry> = serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(idx, r)| ParsedEntry {
            lineno: idx + 1,
            indicator_id: r.kpi_id,
            fiscal_year: r.fiscal_year,
            period: r.period.unwrap_or_default(),
            value: r.value,
            target: r.target,
            dimension: r.dimension,
            dimension_value: r.dimension_value,
            unit: r.unit.unwrap_or_default(),
            notes: r.notes.unwrap_or_default(),
            submitted_by: r.submitted_by.unwrap_or_default(),
            submitted_at: r.submitted_at.unwrap_or_default(),
            status: r.status,
            rejection_reason: r.rejection_reason,
        })
        .collect())
}

fn read_json_entries(path: String) -> ReportResult<Vec<ParsedEntry>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
    parse_json_entries(&contents)
}

fn read_entry_data(root_path: String, cfs: &FileSource) -> ReportResult<Vec<ParsedEntry>> {
    let p: PathBuf = [root_path, cfs.file_path.clone()].iter().collect();
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read entry file {:?}", p2);
    match cfs.provider.as_str() {
        "csv" => io_csv::read_csv_entries(p2, cfs),
        "xlsx" => io_excel::read_excel_entries(p2, cfs),
        "json" => read_json_entries(p2),
        x => whatever!("Provider not implemented {:?}", x),
    }
}

pub fn validate_catalog(defs: &[KpiDefinition]) -> ReportResult<Catalog> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut indicators: Vec<Indicator> = Vec::new();
    for def in defs {
        if !seen.insert(def.kpi_id.clone()) {
            whatever!("Duplicate indicator id {:?} in the catalog", def.kpi_id);
        }
        let aggregation = match def.aggregation.as_str() {
            "sum" => AggregationMode::Sum,
            "avg" => AggregationMode::Avg,
            "latest" => AggregationMode::Latest,
            "count" => AggregationMode::Count,
            "append" => AggregationMode::Append,
            x => {
                whatever!("Cannot use aggregation mode {:?} for indicator {:?}", x, def.kpi_id)
            }
        };
        let target_direction = match def.target_direction.as_deref() {
            None | Some("atLeast") => TargetDirection::AtLeast,
            Some("atMost") => TargetDirection::AtMost,
            Some(x) => {
                whatever!("Cannot use target direction {:?} for indicator {:?}", x, def.kpi_id)
            }
        };
        indicators.push(Indicator {
            indicator_id: def.kpi_id.clone(),
            category_id: def.category_id.clone(),
            name_local: def.name_local.clone(),
            name_en: def.name_en.clone(),
            unit: def.unit.clone().unwrap_or_default(),
            target_value: def.target_value,
            target_direction,
            aggregation,
            frequency: def.frequency.clone().unwrap_or_default(),
            department_id: def.department_id.clone().unwrap_or_default(),
        });
    }
    if indicators.is_empty() {
        whatever!("The catalog is empty");
    }
    Ok(Catalog::new(indicators))
}

pub fn validate_users(defs: &[UserDefinition]) -> ReportResult<Vec<Caller>> {
    let mut res: Vec<Caller> = Vec::new();
    for def in defs {
        match Role::parse(&def.role) {
            Some(role) => res.push(Caller::new(&def.email, Some(role))),
            None => {
                whatever!("Cannot use role {:?} for user {:?}", def.role, def.email)
            }
        }
    }
    Ok(res)
}

/// Turns parsed rows into observations. Rows referencing an unknown
/// indicator or carrying an unknown status are skipped with a warning;
/// they never fail the run.
pub fn validate_entries(
    parsed: &[ParsedEntry],
    catalog: &Catalog,
    default_year: i32,
) -> Vec<Observation> {
    let mut res: Vec<Observation> = Vec::new();
    for pe in parsed {
        let Some(indicator) = catalog.get(&pe.indicator_id) else {
            warn!(
                "validate_entries: row {}: unknown indicator {:?}, skipping",
                pe.lineno, pe.indicator_id
            );
            continue;
        };
        let status = match &pe.status {
            None => EntryStatus::Pending,
            Some(s) => match EntryStatus::parse(s) {
                Some(status) => status,
                None => {
                    warn!(
                        "validate_entries: row {}: unknown status {:?}, skipping",
                        pe.lineno, s
                    );
                    continue;
                }
            },
        };
        res.push(Observation {
            id: String::new(),
            indicator_id: pe.indicator_id.clone(),
            fiscal_year: pe.fiscal_year.unwrap_or(default_year),
            period: if pe.period.is_empty() {
                "annual".to_string()
            } else {
                pe.period.clone()
            },
            value: pe.value,
            // The file's target snapshot wins; the catalog fills the gap.
            target: pe.target.or(indicator.target_value),
            dimension: pe.dimension.clone(),
            dimension_value: pe.dimension_value.clone(),
            unit: if pe.unit.is_empty() {
                indicator.unit.clone()
            } else {
                pe.unit.clone()
            },
            notes: pe.notes.clone(),
            submitted_by: pe.submitted_by.clone(),
            submitted_at: pe.submitted_at.clone(),
            status,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: pe.rejection_reason.clone(),
            deleted_by: None,
            deleted_at: None,
            previous_status: None,
            resubmission_of: None,
        });
    }
    res
}

fn fmt_value(v: Option<f64>) -> JSValue {
    match v {
        Some(x) => json!(format!("{:.2}", x)),
        None => JSValue::Null,
    }
}

fn rollup_to_json(r: &Rollup) -> JSValue {
    json!({
        "total": r.total.to_string(),
        "met": r.met.to_string(),
        "notMet": r.not_met.to_string(),
        "noData": r.no_data.to_string(),
    })
}

fn scorecards_to_json(report: &ScorecardReport, catalog: &Catalog) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for cat in report.categories.iter() {
        let mut rows: Vec<JSValue> = Vec::new();
        for row in cat.rows.iter() {
            let name = catalog
                .get(&row.indicator_id)
                .map(|i| i.name_en.clone())
                .unwrap_or_default();
            let unit = catalog
                .get(&row.indicator_id)
                .map(|i| i.unit.clone())
                .unwrap_or_default();
            rows.push(json!({
                "kpi": row.indicator_id,
                "name": name,
                "unit": unit,
                "value": fmt_value(row.value),
                "target": fmt_value(row.target),
                "met": row.met,
                "entries": row.entry_count.to_string(),
                "trend": row.trend.as_str(),
            }));
        }
        l.push(json!({
            "category": cat.category_id,
            "summary": rollup_to_json(&cat.rollup),
            "indicators": rows,
        }));
    }
    l
}

fn by_year_to_json(summaries: &[YearSummary]) -> Vec<JSValue> {
    summaries
        .iter()
        .map(|ys| {
            let mut values: JSMap<String, JSValue> = JSMap::new();
            for (kpi, v) in ys.values.iter() {
                values.insert(kpi.clone(), fmt_value(Some(*v)));
            }
            json!({"year": ys.year, "values": values})
        })
        .collect()
}

fn build_summary_js(
    faculty_name: &str,
    fiscal_year: i32,
    prior_year: i32,
    report: &ScorecardReport,
    by_year: &[YearSummary],
    filters: &AvailableFilters,
    catalog: &Catalog,
) -> JSValue {
    json!({
        "config": {
            "faculty": faculty_name,
            "fiscalYear": fiscal_year.to_string(),
            "priorFiscalYear": prior_year.to_string(),
        },
        "summary": rollup_to_json(&report.summary),
        "categories": scorecards_to_json(report, catalog),
        "byYear": by_year_to_json(by_year),
        "filters": {
            "years": filters.years.clone(),
            "periods": filters.periods.clone(),
            "dimensions": filters.dimensions.clone(),
        },
    })
}

fn fetch(store: &InMemoryStore, filter: EntryFilter) -> ReportResult<Vec<Observation>> {
    match store.fetch_observations(&filter) {
        Ok(rows) => Ok(rows),
        Err(e) => whatever!("Store error: {:?}", e),
    }
}

pub fn run_report(args: &Args) -> ReportResult<()> {
    let config_p = Path::new(args.config.as_str());
    let config_str = fs::read_to_string(args.config.clone()).context(OpeningJsonSnafu {})?;
    let config: KpiConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    debug!("config: {:?}", config);

    let catalog = validate_catalog(&config.indicators)?;
    info!("catalog: {} indicators", catalog.len());

    if let Some(user_defs) = &config.users {
        let users = validate_users(user_defs)?;
        info!("{} authorized users", users.len());
    }

    let fiscal_year = match args.year {
        Some(y) => y,
        None => match config.report_settings.fiscal_year()? {
            Some(y) => y,
            None => whatever!("No fiscal year given: set reportSettings.fiscalYear or pass --year"),
        },
    };
    let prior_year = match args.prior_year {
        Some(y) => y,
        None => config
            .report_settings
            .prior_fiscal_year()?
            .unwrap_or(fiscal_year - 1),
    };
    info!("reporting year {} against {}", fiscal_year, prior_year);

    // --input bypasses the configured sources; paths in the configuration
    // are resolved relative to the configuration file.
    let (sources, root) = match &args.input {
        Some(input) => {
            let provider = args.input_type.clone().unwrap_or_else(|| "csv".to_string());
            let source = FileSource::direct(input.clone(), provider, args.excel_worksheet_name.clone());
            (vec![source], String::new())
        }
        None => {
            let root_p = config_p.parent().context(MissingParentDirSnafu {})?;
            let root = root_p.as_os_str().to_str().unwrap_or("").to_string();
            (config.entry_file_sources.clone(), root)
        }
    };
    if sources.is_empty() {
        whatever!("no entry file sources detected");
    }

    let mut store = InMemoryStore::new();
    for cfs in sources.iter() {
        let parsed = read_entry_data(root.clone(), cfs)?;
        let entries = validate_entries(&parsed, &catalog, fiscal_year);
        info!(
            "{}: {} rows parsed, {} observations accepted",
            cfs.file_path,
            parsed.len(),
            entries.len()
        );
        for obs in entries {
            if let Err(e) = store.write_observation(obs) {
                whatever!("Store error: {:?}", e);
            }
        }
    }
    info!("{} observations loaded", store.len());

    let current = fetch(&store, EntryFilter::for_year(fiscal_year))?;
    let prior = fetch(&store, EntryFilter::for_year(prior_year))?;
    let all = fetch(&store, EntryFilter::default())?;

    let report = build_scorecard(&catalog, &current, &prior);
    let by_year = summary_by_year(&catalog, &all);
    let filters = available_filters(&all);

    let result_js = build_summary_js(
        &config.report_settings.faculty_name,
        fiscal_year,
        prior_year,
        &report,
        &by_year,
        &filters,
        &catalog,
    );
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    let out_path = match &args.out {
        Some(p) => Some(p.clone()),
        None => config
            .report_settings
            .output_directory
            .clone()
            .map(|d| format!("{}/report_{}.json", d, fiscal_year)),
    };
    match out_path.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(p) => {
            fs::write(p, &pretty_js_stats).context(WritingOutputSnafu { path: p.to_string() })?;
            info!("report written to {}", p);
        }
    }

    // The reference report, if provided for comparison
    if let Some(reference_p) = &args.reference {
        let reference = read_reference(reference_p.clone())?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_stats {
            warn!("Found differences with the reference report");
            print_diff(pretty_js_reference.as_str(), pretty_js_stats.as_ref(), "\n");
            whatever!("Difference detected between calculated report and reference report")
        }
    }

    Ok(())
}
