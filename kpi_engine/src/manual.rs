/*!

This is the long-form manual for `kpi_engine` and `vetkpi`.

## Input formats

The command-line tool reads observation files in the following formats:
* `csv` Comma Separated Values
* `xlsx` Excel workbooks (one worksheet)
* `json` An array of observation records

### `csv` and `xlsx`

Both tabular formats share one fixed column layout:

| # | column | notes |
|---|-----------------|------------------------------------------------|
| 1 | indicator_id | must exist in the catalog, e.g. `7.1.1` |
| 2 | fiscal_year | integer; blank falls back to the report year |
| 3 | period | `annual`, `Q1`..`Q4`, or a free-form label |
| 4 | value | blank = recorded but non-numeric |
| 5 | target | target snapshot at submission time |
| 6 | dimension | optional breakdown name, e.g. `campus` |
| 7 | dimension_value | optional breakdown value, e.g. `Bangkhen` |
| 8 | unit | |
| 9 | notes | |
| 10 | submitted_by | |
| 11 | submitted_at | ISO-8601 timestamp |
| 12 | status | blank = `pending` |
| 13 | rejection_reason| only meaningful with status `rejected` |

Trailing columns may be omitted. The first data row defaults to row 2
(one header row); set `firstDataRowIndex` on the file source to override.
For Excel files the first worksheet is used unless `worksheetName` is
given.

Rows that reference an indicator missing from the catalog are skipped
with a warning; they never fail the run. A `value` cell that does not
parse as a number is kept as a non-numeric observation.

### `json`

An array of records using the field names of the observation documents:

```json
[
  {
    "kpi_id": "7.1.1",
    "fiscal_year": 2567,
    "period": "annual",
    "value": 82.5,
    "submitted_by": "staff@vet.example",
    "submitted_at": "2567-10-01T09:00:00Z",
    "status": "approved"
  }
]
```

Absent fields take the same defaults as blank tabular cells.

## Configuration

`vetkpi --config report.json` drives a whole report run from one file:

```json
{
  "reportSettings": {
    "facultyName": "Faculty of Veterinary Medicine",
    "fiscalYear": 2567,
    "priorFiscalYear": 2566
  },
  "indicators": [
    {
      "kpiId": "7.1.1",
      "categoryId": "7.1",
      "nameLocal": "อัตราการสอบผ่านใบประกอบวิชาชีพ",
      "nameEn": "Licensure pass rate",
      "unit": "percent",
      "targetValue": 80,
      "aggregation": "avg",
      "frequency": "annual",
      "departmentId": "academic"
    }
  ],
  "entryFileSources": [
    { "provider": "csv", "filePath": "entries_2567.csv" },
    { "provider": "xlsx", "filePath": "entries_2566.xlsx", "worksheetName": "Entries" }
  ],
  "users": [
    { "email": "dean@vet.example", "role": "admin", "name": "Dean" },
    { "email": "qa@vet.example", "role": "reviewer", "name": "QA office" }
  ]
}
```

Accepted `aggregation` values: `sum`, `avg`, `latest`, `count`, `append`.
An indicator may add `"targetDirection": "atMost"` for minimization
targets (the default is `atLeast`). Accepted roles: `admin`, `reviewer`,
`user`. File paths are resolved relative to the configuration file.

`--input FILE` (with `--input-type csv|xlsx|json`) replaces the
configured file sources with a single file, and `--year` / `--prior-year`
override the fiscal years. `--out` writes the JSON report to a file
instead of the standard output. With `--reference FILE` the produced
report is compared against a reference report and any difference is
printed and reported as an error, which is how the regression data sets
are checked.

## Report

The report is one JSON document: the `config` echo, the faculty-wide
`summary` (total / met / notMet / noData), the per-category scorecards
with one row per indicator (2-decimal values, met flag, entry count,
year-over-year trend), the `byYear` export table and the distinct
`filters` observed in the data.

*/
