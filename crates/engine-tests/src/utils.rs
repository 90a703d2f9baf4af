use engine_runtime::report::{RunReport, UnitReport, UnitState};
use model::core::identifiers::DatasetKey;

/// Parsed CSV artifact: header plus data rows.
#[derive(Debug)]
pub struct Artifact {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Artifact {
    pub fn parse(contents: &str) -> Self {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(contents.as_bytes());

        let header = reader
            .headers()
            .expect("artifact header")
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|r| r.expect("artifact row").iter().map(str::to_string).collect())
            .collect();

        Artifact { header, rows }
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Vec<&str> {
        let idx = self
            .header
            .iter()
            .position(|h| h == name)
            .unwrap_or_else(|| panic!("no column {name} in {:?}", self.header));
        self.rows.iter().map(|row| row[idx].as_str()).collect()
    }
}

/// Report entry of `key`, panicking when the run never saw it.
pub fn unit<'a>(report: &'a RunReport, key: &DatasetKey) -> &'a UnitReport {
    report
        .unit(key)
        .unwrap_or_else(|| panic!("no report for {key}: {:?}", report.units))
}

pub fn assert_committed(report: &RunReport, key: &DatasetKey, rows: usize) {
    let unit = unit(report, key);
    assert_eq!(
        unit.state,
        UnitState::Committed,
        "{key} should be committed: {unit:?}"
    );
    assert_eq!(unit.rows_appended, rows, "rows appended for {key}");
}

pub fn assert_failed(report: &RunReport, key: &DatasetKey, kind: &str) {
    let unit = unit(report, key);
    assert_eq!(unit.state, UnitState::Failed, "{key} should fail: {unit:?}");
    assert_eq!(unit.error_kind, Some(kind), "error kind for {key}");
}
