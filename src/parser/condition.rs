use evalexpr::{build_operator_tree, Node, Value as Verdict};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::EvaluationError;
use crate::parser::bindings::{build_context, json_kind, value_kind};

/// Decides from an upstream JSON body whether the injected token was rejected.
///
/// Every failure (unparsable body, unknown names, runtime errors, non-boolean
/// results) is logged and reported as "valid" so traffic keeps flowing.
#[derive(Debug)]
pub struct InvalidityEvaluator {
    source: String,
    program: Option<Result<Node, EvaluationError>>,
}

impl InvalidityEvaluator {
    pub fn new(condition: &str) -> Self {
        let source = condition.trim().to_owned();
        if source.is_empty() {
            return Self { source, program: None };
        }
        let program = compile_condition(&source);
        if let Err(e) = &program {
            error!("invalid token condition '{}': {}", source, e);
        }
        Self { source, program: Some(program) }
    }

    pub fn is_enabled(&self) -> bool {
        self.program.is_some()
    }

    pub fn is_invalid(&self, body: &[u8]) -> bool {
        let program = match &self.program {
            None => return false,
            Some(Err(e)) => {
                debug!("skipping token check, condition is broken: {}", e);
                return false;
            }
            Some(Ok(program)) => program,
        };

        let document = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(document)) => document,
            Ok(other) => {
                error!("response JSON is a {}, expected an object", json_kind(&other));
                return false;
            }
            Err(e) => {
                error!("failed to parse response JSON: {}", e);
                return false;
            }
        };

        match judge(program, document) {
            Ok(true) => {
                info!("condition '{}' is true, token is invalid and must be fetched again", self.source);
                true
            }
            Ok(false) => {
                debug!("condition '{}' is false, token is valid", self.source);
                false
            }
            Err(EvaluationError::NotBoolean(kind)) => {
                warn!("condition '{}' returned {}, expected a boolean", self.source, kind);
                false
            }
            Err(e) => {
                error!("condition '{}' failed: {}", self.source, e);
                false
            }
        }
    }
}

/// Parse a condition once; the tree is reused for every response.
pub fn compile_condition(source: &str) -> Result<Node, EvaluationError> {
    build_operator_tree(source).map_err(|e| EvaluationError::Compile(e.to_string()))
}

/// One-shot form of [`InvalidityEvaluator::is_invalid`].
pub fn is_token_invalid(body: &[u8], condition: &str) -> bool {
    InvalidityEvaluator::new(condition).is_invalid(body)
}

fn judge(program: &Node, document: Map<String, Value>) -> Result<bool, EvaluationError> {
    let context = build_context(document)?;
    match program
        .eval_with_context(&context)
        .map_err(|e| EvaluationError::Runtime(e.to_string()))?
    {
        Verdict::Boolean(verdict) => Ok(verdict),
        other => Err(EvaluationError::NotBoolean(value_kind(&other).to_owned())),
    }
}
