use crate::config::*;

/// A builder for submitting observations against a catalog.
///
/// This is the one place referential integrity is enforced: an unknown
/// indicator id is rejected at submission time. The indicator's current
/// target and unit are snapshotted onto the observation, so later catalog
/// edits do not rewrite history.
///
/// ```
/// use kpi_engine::builder::Builder;
/// use kpi_engine::{AggregationMode, Catalog, Indicator, TargetDirection};
///
/// let catalog = Catalog::new(vec![Indicator {
///     indicator_id: "7.1.1".to_string(),
///     category_id: "7.1".to_string(),
///     name_local: "อัตราการสอบผ่านใบประกอบวิชาชีพ".to_string(),
///     name_en: "Licensure pass rate".to_string(),
///     unit: "percent".to_string(),
///     target_value: Some(80.0),
///     target_direction: TargetDirection::AtLeast,
///     aggregation: AggregationMode::Avg,
///     frequency: "annual".to_string(),
///     department_id: "academic".to_string(),
/// }]);
///
/// let builder = Builder::new(&catalog, "staff@vet.example");
/// let obs = builder.observation("7.1.1", 2567, "annual", Some(82.5), "2567-10-01T09:00:00Z")?;
/// assert_eq!(obs.target, Some(80.0));
/// assert_eq!(obs.unit, "percent");
///
/// # Ok::<(), kpi_engine::KpiError>(())
/// ```
pub struct Builder<'a> {
    catalog: &'a Catalog,
    submitted_by: String,
}

impl<'a> Builder<'a> {
    pub fn new(catalog: &'a Catalog, submitted_by: &str) -> Builder<'a> {
        Builder {
            catalog,
            submitted_by: submitted_by.to_string(),
        }
    }

    /// Composes a new pending observation. The id stays empty until the
    /// store assigns one.
    pub fn observation(
        &self,
        indicator_id: &str,
        fiscal_year: i32,
        period: &str,
        value: Option<f64>,
        submitted_at: &str,
    ) -> Result<Observation, KpiError> {
        let indicator = self
            .catalog
            .get(indicator_id)
            .ok_or(KpiError::NotFound { id: indicator_id.to_string() })?;
        Ok(Observation {
            id: String::new(),
            indicator_id: indicator.indicator_id.clone(),
            fiscal_year,
            period: period.to_string(),
            value,
            target: indicator.target_value,
            dimension: None,
            dimension_value: None,
            unit: indicator.unit.clone(),
            notes: String::new(),
            submitted_by: self.submitted_by.clone(),
            submitted_at: submitted_at.to_string(),
            status: EntryStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            deleted_by: None,
            deleted_at: None,
            previous_status: None,
            resubmission_of: None,
        })
    }

    /// A fresh observation superseding a rejected one. Rejection is a
    /// one-shot decision; the old record keeps its status and the new one
    /// points back at it.
    pub fn resubmission(
        &self,
        previous: &Observation,
        value: Option<f64>,
        submitted_at: &str,
    ) -> Result<Observation, KpiError> {
        let mut obs = self.observation(
            &previous.indicator_id,
            previous.fiscal_year,
            &previous.period,
            value,
            submitted_at,
        )?;
        obs.resubmission_of = Some(previous.id.clone());
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(vec![Indicator {
            indicator_id: "7.2.10".to_string(),
            category_id: "7.2".to_string(),
            name_local: "ความพึงพอใจผู้รับบริการ".to_string(),
            name_en: "Customer satisfaction".to_string(),
            unit: "score".to_string(),
            target_value: Some(4.0),
            target_direction: TargetDirection::AtLeast,
            aggregation: AggregationMode::Avg,
            frequency: "quarterly".to_string(),
            department_id: "hospital".to_string(),
        }])
    }

    #[test]
    fn snapshots_target_and_unit_from_the_catalog() {
        let catalog = catalog();
        let builder = Builder::new(&catalog, "staff@vet.example");
        let obs = builder
            .observation("7.2.10", 2567, "Q1", Some(4.2), "2567-01-05T08:00:00Z")
            .unwrap();
        assert_eq!(obs.status, EntryStatus::Pending);
        assert_eq!(obs.target, Some(4.0));
        assert_eq!(obs.unit, "score");
        assert_eq!(obs.submitted_by, "staff@vet.example");
        assert!(obs.id.is_empty());
    }

    #[test]
    fn unknown_indicator_is_rejected_at_submission() {
        let catalog = catalog();
        let builder = Builder::new(&catalog, "staff@vet.example");
        let err = builder
            .observation("9.9.9", 2567, "Q1", Some(1.0), "2567-01-05T08:00:00Z")
            .unwrap_err();
        assert_eq!(err, KpiError::NotFound { id: "9.9.9".to_string() });
    }

    #[test]
    fn resubmission_references_the_rejected_entry() {
        let catalog = catalog();
        let builder = Builder::new(&catalog, "staff@vet.example");
        let mut rejected = builder
            .observation("7.2.10", 2567, "Q1", Some(3.1), "2567-01-05T08:00:00Z")
            .unwrap();
        rejected.id = "e-000042".to_string();
        rejected.status = EntryStatus::Rejected;

        let fresh = builder
            .resubmission(&rejected, Some(4.1), "2567-01-09T08:00:00Z")
            .unwrap();
        assert_eq!(fresh.status, EntryStatus::Pending);
        assert_eq!(fresh.resubmission_of.as_deref(), Some("e-000042"));
        assert_eq!(fresh.period, "Q1");
    }
}
