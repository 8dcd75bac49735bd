/*!

# Quick start

This example walks one indicator through the whole cycle: catalog, two
submissions across two fiscal years, a review decision, and the annual
scorecard.

The catalog is an explicit value. It is usually loaded from the host
application's configuration at startup and stays immutable afterwards;
there is no hidden registry.

```
use kpi_engine::builder::Builder;
use kpi_engine::store::{set_status, EntryFilter, EntryStore, InMemoryStore};
use kpi_engine::workflow::ReviewAction;
use kpi_engine::{
    build_scorecard, AggregationMode, Caller, Catalog, Indicator, Role, TargetDirection, Trend,
};

let catalog = Catalog::new(vec![Indicator {
    indicator_id: "7.1.1".to_string(),
    category_id: "7.1".to_string(),
    name_local: "อัตราการสอบผ่านใบประกอบวิชาชีพ".to_string(),
    name_en: "Licensure pass rate".to_string(),
    unit: "percent".to_string(),
    target_value: Some(80.0),
    target_direction: TargetDirection::AtLeast,
    aggregation: AggregationMode::Avg,
    frequency: "annual".to_string(),
    department_id: "academic".to_string(),
}]);

// Submissions start pending. The store assigns the ids.
let mut store = InMemoryStore::new();
let builder = Builder::new(&catalog, "staff@vet.example");
let id = store.write_observation(builder.observation(
    "7.1.1", 2567, "annual", Some(82.5), "2567-10-01T09:00:00Z",
)?)?;
store.write_observation(builder.observation(
    "7.1.1", 2566, "annual", Some(75.0), "2566-10-01T09:00:00Z",
)?)?;

// A reviewer decides the current-year entry.
let reviewer = Caller::new("reviewer@vet.example", Some(Role::Reviewer));
set_status(&mut store, &id, ReviewAction::Approve, &reviewer, "2567-10-02T09:00:00Z")?;

// Every report is a fresh fetch and a fresh reduction.
let current = store.fetch_observations(&EntryFilter::for_year(2567))?;
let prior = store.fetch_observations(&EntryFilter::for_year(2566))?;
let report = build_scorecard(&catalog, &current, &prior);

let row = &report.categories[0].rows[0];
assert_eq!(row.value, Some(82.5));
assert!(row.met);
assert_eq!(row.trend, Trend::Up);

# Ok::<(), kpi_engine::KpiError>(())
```

A few things worth noticing:

- Null-valued observations (a submission whose value could not be read as
  a number) count towards `entry_count` but never towards the arithmetic.
- A rejected entry stays rejected. To correct it, submit a new observation
  with [`Builder::resubmission`](crate::builder::Builder::resubmission);
  the new record points back at the old one.
- Soft-deleted entries stay in the store but are invisible to every
  default fetch, so they never reach the aggregator.

For the observation file formats and the configuration accepted by the
`vetkpi` command-line tool, see the [manual](crate::manual).

*/
