//! Consistency checks for assembled scenarios.
use crate::requirement::ExpandedStructure;
use crate::scenario::Scenario;
use crate::table::ClassifiedTable;
use itertools::Itertools;
use std::fmt;

/// The problems found when checking a scenario
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    problems: Vec<String>,
}

impl ValidationReport {
    /// Whether no problems were found
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    /// The problems found
    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    fn push(&mut self, problem: String) {
        self.problems.push(problem);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Scenario is valid")
        } else {
            write!(f, "{}", self.problems.iter().join("\n"))
        }
    }
}

/// Check that a scenario satisfies the requirement structure it was built for.
///
/// Every requirement must have a matching segment in the same position, taken from a
/// simulation which really was classified with the requested category. Values must be
/// non-negative and segment lengths must add up to the scenario length.
pub fn validate_scenario(
    scenario: &Scenario,
    structure: &ExpandedStructure,
    classified: &ClassifiedTable,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    let num_steps = structure.num_steps();
    if scenario.segments().len() != num_steps {
        report.push(format!(
            "Scenario has {} segments but {num_steps} were required",
            scenario.segments().len()
        ));
    }

    for (step, (requirement, segment)) in structure.steps().zip(scenario.segments()).enumerate() {
        let step = step + 1;
        if requirement.season != segment.season || requirement.category != segment.category {
            report.push(format!(
                "Step {step}: expected {} ({}) but found {} ({})",
                requirement.season, requirement.category, segment.season, segment.category
            ));
            continue;
        }
        match classified.get(segment.simulation, segment.season.as_str()) {
            Some(label) if *label == segment.category => {}
            Some(label) => report.push(format!(
                "Step {step}: simulation {} is {label} in {}, not {}",
                segment.simulation, segment.season, segment.category
            )),
            None => report.push(format!(
                "Step {step}: no classification for simulation {} in {}",
                segment.simulation, segment.season
            )),
        }
    }

    let total: usize = scenario.segments().iter().map(|s| s.length).sum();
    if total != scenario.len() {
        report.push(format!(
            "Segments cover {total} values but the scenario has {}",
            scenario.len()
        ));
    }
    if let Some((day, value)) = scenario.iter().find(|(_, v)| v.is_nan() || *v < 0.0) {
        report.push(format!("Day {day} has invalid value {value}"));
    }

    report
}
