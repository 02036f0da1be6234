//! Parameter values: bound once at parse time when static, deferred and
//! re-evaluated against live variable state when dynamic.

use super::PlaybackSpot;
use crate::error::ExecutionError;
use crate::parsing::{MixedValue, ValuePart};

/// Collaborator that evaluates `{expression}` bodies and `@set`
/// assignments against named string-valued variables. This crate only
/// supplies the raw body text and a [`PlaybackSpot`] for error attribution.
pub trait ExpressionEvaluator {
    fn evaluate(&mut self, body: &str, spot: &PlaybackSpot) -> Result<String, ExecutionError>;

    fn assign(&mut self, expression: &str, spot: &PlaybackSpot) -> Result<(), ExecutionError>;
}

/// A command parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Fully resolved at bind time.
    Static(String),
    /// Carries unevaluated expression bodies plus the owning spot;
    /// resolved against current variable state at execution time.
    Dynamic {
        parts: Vec<ValuePart>,
        spot: PlaybackSpot,
    },
}

impl ParamValue {
    pub fn from_mixed(value: &MixedValue, spot: &PlaybackSpot) -> Self {
        match value.as_static() {
            Some(literal) => Self::Static(literal),
            None => Self::Dynamic {
                parts: value.parts.clone(),
                spot: spot.clone(),
            },
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    pub fn as_static(&self) -> Option<&str> {
        match self {
            Self::Static(s) => Some(s),
            Self::Dynamic { .. } => None,
        }
    }

    /// Interpolate into the final literal string, substituting expression
    /// placeholders with evaluator results.
    pub fn resolve(&self, eval: &mut dyn ExpressionEvaluator) -> Result<String, ExecutionError> {
        match self {
            Self::Static(s) => Ok(s.clone()),
            Self::Dynamic { parts, spot } => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        ValuePart::PlainText(t) => out.push_str(t),
                        ValuePart::Expression(body) => out.push_str(&eval.evaluate(body, spot)?),
                    }
                }
                Ok(out)
            }
        }
    }

    /// Resolve and parse as a decimal, attributing failures to `spot`.
    pub fn resolve_f32(
        &self,
        eval: &mut dyn ExpressionEvaluator,
        spot: &PlaybackSpot,
    ) -> Result<f32, ExecutionError> {
        let literal = self.resolve(eval)?;
        literal
            .parse()
            .map_err(|_| ExecutionError::InvalidValue {
                value: literal,
                spot: spot.clone(),
                reason: "expected a decimal number".into(),
            })
    }
}
