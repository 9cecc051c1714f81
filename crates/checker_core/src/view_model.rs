use crate::{CheckResult, ProgressRow, Screen, SourceEntry};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionView {
    pub screen: Screen,
    pub sources: Vec<SourceEntry>,
    /// "Add source" and "run check" are usable.
    pub controls_enabled: bool,
    pub progress: Vec<ProgressRow>,
    pub result: Option<CheckResult>,
    pub dirty: bool,
}
