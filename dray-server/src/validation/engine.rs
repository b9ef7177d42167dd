//! Stage/priority ordered rule pipeline

use shared::types::Timestamp;

use crate::core::error::MultiError;
use crate::db::models::ShipmentControl;
use crate::db::repository::shipment::BolDuplicate;
use crate::holds::HoldGates;

/// Evaluation stage; lower stages run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Basic = 0,
    DataIntegrity = 1,
    BusinessRules = 2,
    Compliance = 3,
}

/// Priority within a stage; High runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    High = 0,
    Medium = 1,
    Low = 2,
}

/// Read-only facts a rule may consult besides the entity itself.
///
/// Anything that needs I/O (duplicate-BOL candidates, tenant control row,
/// hold gates) is resolved by the service before evaluation so rules stay
/// pure.
pub struct ValidationContext<'a> {
    pub now: Timestamp,
    pub control: &'a ShipmentControl,
    pub gates: HoldGates,
    pub bol_duplicates: &'a [BolDuplicate],
}

impl<'a> ValidationContext<'a> {
    pub fn new(now: Timestamp, control: &'a ShipmentControl) -> Self {
        Self {
            now,
            control,
            gates: HoldGates::default(),
            bol_duplicates: &[],
        }
    }

    pub fn with_gates(mut self, gates: HoldGates) -> Self {
        self.gates = gates;
        self
    }

    pub fn with_bol_duplicates(mut self, duplicates: &'a [BolDuplicate]) -> Self {
        self.bol_duplicates = duplicates;
        self
    }
}

/// A single named rule.
pub struct Rule<T> {
    pub name: &'static str,
    pub stage: Stage,
    pub priority: Priority,
    pub check: fn(&ValidationContext<'_>, &T, &mut MultiError),
}

/// An ordered set of rules over one entity type.
pub struct RulePipeline<T> {
    rules: Vec<Rule<T>>,
}

impl<T> RulePipeline<T> {
    /// Build a pipeline; rules are sorted by `(stage, priority)` and keep
    /// their declaration order within a tier.
    pub fn new(mut rules: Vec<Rule<T>>) -> Self {
        rules.sort_by_key(|r| (r.stage, r.priority));
        Self { rules }
    }

    /// Run every rule, collecting all failures.
    pub fn evaluate(&self, ctx: &ValidationContext<'_>, entity: &T) -> Result<(), MultiError> {
        let mut multi = MultiError::new();
        for rule in &self.rules {
            (rule.check)(ctx, entity, &mut multi);
        }
        multi.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ValidationCode;

    struct Dummy;

    fn control() -> ShipmentControl {
        ShipmentControl::default()
    }

    #[test]
    fn rules_run_in_stage_priority_order() {
        // registration order is deliberately scrambled
        let pipeline = RulePipeline::new(vec![
            Rule::<Dummy> {
                name: "compliance",
                stage: Stage::Compliance,
                priority: Priority::High,
                check: |_, _, m| m.add("c", ValidationCode::Invalid, "compliance"),
            },
            Rule::<Dummy> {
                name: "basic_low",
                stage: Stage::Basic,
                priority: Priority::Low,
                check: |_, _, m| m.add("b", ValidationCode::Invalid, "basic low"),
            },
            Rule::<Dummy> {
                name: "basic_high",
                stage: Stage::Basic,
                priority: Priority::High,
                check: |_, _, m| m.add("a", ValidationCode::Invalid, "basic high"),
            },
        ]);

        let control = control();
        let ctx = ValidationContext::new(0, &control);
        let err = pipeline.evaluate(&ctx, &Dummy).unwrap_err();
        let fields: Vec<_> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn all_rules_contribute() {
        let pipeline = RulePipeline::new(vec![
            Rule::<Dummy> {
                name: "one",
                stage: Stage::Basic,
                priority: Priority::High,
                check: |_, _, m| m.add("x", ValidationCode::Required, "one"),
            },
            Rule::<Dummy> {
                name: "two",
                stage: Stage::BusinessRules,
                priority: Priority::High,
                check: |_, _, m| m.add("y", ValidationCode::Invalid, "two"),
            },
        ]);
        let control = control();
        let ctx = ValidationContext::new(0, &control);
        assert_eq!(pipeline.evaluate(&ctx, &Dummy).unwrap_err().len(), 2);
    }

    #[test]
    fn clean_entity_passes() {
        let pipeline: RulePipeline<Dummy> = RulePipeline::new(vec![Rule {
            name: "noop",
            stage: Stage::Basic,
            priority: Priority::High,
            check: |_, _, _| {},
        }]);
        let control = control();
        let ctx = ValidationContext::new(0, &control);
        assert!(pipeline.evaluate(&ctx, &Dummy).is_ok());
    }
}
