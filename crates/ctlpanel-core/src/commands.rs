//! Command table and the default command set.
//!
//! Commands are pure functions addressed by a non-negative integer id. The
//! table is built once at startup and shared read-only by every connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Number, Value};
use thiserror::Error;

use crate::protocol::{INVALID_DATA, UNKNOWN_COMMAND};

/// Errors returned by command dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The id is negative or has no registered handler.
    #[error("unknown command id {id}")]
    UnknownCommand {
        /// Requested id.
        id: i64,
    },
    /// The handler could not work with the supplied `data`.
    #[error("invalid command data: {message}")]
    InvalidData {
        /// What was wrong with the payload.
        message: String,
    },
}

impl CommandError {
    /// Shorthand for [`CommandError::InvalidData`].
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Machine-readable code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCommand { .. } => UNKNOWN_COMMAND,
            Self::InvalidData { .. } => INVALID_DATA,
        }
    }
}

/// A pure `data -> result` command.
pub trait CommandHandler: Send + Sync {
    /// Run the command.
    fn call(&self, data: &Value) -> Result<Value, CommandError>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Value) -> Result<Value, CommandError> + Send + Sync,
{
    fn call(&self, data: &Value) -> Result<Value, CommandError> {
        self(data)
    }
}

struct Entry {
    name: String,
    handler: Arc<dyn CommandHandler>,
}

/// Validated mapping from command id to handler.
pub struct CommandTable {
    entries: BTreeMap<u32, Entry>,
}

impl CommandTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Table holding the three reference commands:
    /// `0` product, `1` sum, `2` echo.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register(0, "product", product);
        table.register(1, "sum", sum);
        table.register(2, "echo", echo);
        table
    }

    /// Register (or replace) the handler for `id`.
    pub fn register(&mut self, id: u32, name: &str, handler: impl CommandHandler + 'static) {
        let _ = self.entries.insert(
            id,
            Entry {
                name: name.to_owned(),
                handler: Arc::new(handler),
            },
        );
    }

    /// Run the handler registered for `id`.
    pub fn dispatch(&self, id: i64, data: &Value) -> Result<Value, CommandError> {
        let entry = u32::try_from(id)
            .ok()
            .and_then(|key| self.entries.get(&key))
            .ok_or(CommandError::UnknownCommand { id })?;
        entry.handler.call(data)
    }

    /// Whether `id` has a handler.
    pub fn contains(&self, id: i64) -> bool {
        u32::try_from(id).is_ok_and(|key| self.entries.contains_key(&key))
    }

    /// Registered name of `id`.
    pub fn name(&self, id: i64) -> Option<&str> {
        let key = u32::try_from(id).ok()?;
        self.entries.get(&key).map(|e| e.name.as_str())
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        self.entries.keys().copied().collect()
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no command is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

// ── Default commands ────────────────────────────────────────────────

/// `data[0] * data[1]`.
pub fn product(data: &Value) -> Result<Value, CommandError> {
    arithmetic(data, i64::checked_mul, |a, b| a * b)
}

/// `data[0] + data[1]`.
pub fn sum(data: &Value) -> Result<Value, CommandError> {
    arithmetic(data, i64::checked_add, |a, b| a + b)
}

/// Returns `data` unchanged.
pub fn echo(data: &Value) -> Result<Value, CommandError> {
    Ok(data.clone())
}

/// Apply a binary operation to the first two elements of `data`.
///
/// Integer pairs use checked arithmetic and fall back to `f64` on overflow.
fn arithmetic(
    data: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, CommandError> {
    let (a, b) = match data.as_array().map(Vec::as_slice) {
        Some([a, b, ..]) => (a, b),
        _ => {
            return Err(CommandError::invalid_data(
                "expected an array of at least two numbers",
            ));
        }
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(v) = int_op(x, y) {
            return Ok(Value::from(v));
        }
    }

    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return Err(CommandError::invalid_data("operands must be numbers"));
    };
    Number::from_f64(float_op(x, y))
        .map(Value::Number)
        .ok_or_else(|| CommandError::invalid_data("result is not a finite number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn defaults_registered() {
        let table = CommandTable::with_defaults();
        assert_eq!(table.ids(), vec![0, 1, 2]);
        assert_eq!(table.name(0), Some("product"));
        assert_eq!(table.name(1), Some("sum"));
        assert_eq!(table.name(2), Some("echo"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn product_of_pair() {
        let table = CommandTable::with_defaults();
        assert_eq!(table.dispatch(0, &json!([2, 3])).unwrap(), json!(6));
    }

    #[test]
    fn sum_of_pair() {
        let table = CommandTable::with_defaults();
        assert_eq!(table.dispatch(1, &json!([2, 3])).unwrap(), json!(5));
    }

    #[test]
    fn echo_returns_data() {
        let table = CommandTable::with_defaults();
        assert_eq!(table.dispatch(2, &json!("x")).unwrap(), json!("x"));
        assert_eq!(
            table.dispatch(2, &json!({"nested": [1, null]})).unwrap(),
            json!({"nested": [1, null]})
        );
    }

    #[test]
    fn extra_elements_ignored() {
        assert_eq!(sum(&json!([1, 2, 100])).unwrap(), json!(3));
    }

    #[test]
    fn float_operands() {
        assert_eq!(product(&json!([2.5, 2])).unwrap(), json!(5.0));
        assert_eq!(sum(&json!([0.5, 0.25])).unwrap(), json!(0.75));
    }

    #[test]
    fn negative_integers() {
        assert_eq!(product(&json!([-4, 3])).unwrap(), json!(-12));
        assert_eq!(sum(&json!([-4, 3])).unwrap(), json!(-1));
    }

    #[test]
    fn overflow_falls_back_to_float() {
        let result = product(&json!([i64::MAX, 2])).unwrap();
        assert!(result.is_f64());
    }

    #[test]
    fn non_array_rejected() {
        assert_matches!(product(&json!(3)), Err(CommandError::InvalidData { .. }));
        assert_matches!(sum(&Value::Null), Err(CommandError::InvalidData { .. }));
    }

    #[test]
    fn short_array_rejected() {
        assert_matches!(sum(&json!([1])), Err(CommandError::InvalidData { .. }));
    }

    #[test]
    fn non_numeric_operands_rejected() {
        let err = product(&json!(["a", 2])).unwrap_err();
        assert_eq!(err.code(), INVALID_DATA);
    }

    #[test]
    fn unknown_id() {
        let table = CommandTable::with_defaults();
        assert_eq!(
            table.dispatch(7, &Value::Null),
            Err(CommandError::UnknownCommand { id: 7 })
        );
    }

    #[test]
    fn negative_id_is_unknown() {
        let table = CommandTable::with_defaults();
        assert!(!table.contains(-1));
        assert_eq!(
            table.dispatch(-1, &Value::Null).unwrap_err().code(),
            UNKNOWN_COMMAND
        );
    }

    #[test]
    fn id_beyond_u32_is_unknown() {
        let table = CommandTable::with_defaults();
        assert_matches!(
            table.dispatch(i64::from(u32::MAX) + 1, &Value::Null),
            Err(CommandError::UnknownCommand { .. })
        );
    }

    #[test]
    fn register_closure() {
        let mut table = CommandTable::new();
        assert!(table.is_empty());
        table.register(10, "len", |data: &Value| -> Result<Value, CommandError> {
            data.as_str()
                .map(|s| Value::from(s.len()))
                .ok_or_else(|| CommandError::invalid_data("expected a string"))
        });
        assert_eq!(table.dispatch(10, &json!("abcd")).unwrap(), json!(4));
        assert!(table.contains(10));
    }

    #[test]
    fn register_replaces() {
        let mut table = CommandTable::with_defaults();
        table.register(2, "constant", |_: &Value| -> Result<Value, CommandError> {
            Ok(json!(42))
        });
        assert_eq!(table.dispatch(2, &json!("x")).unwrap(), json!(42));
        assert_eq!(table.name(2), Some("constant"));
        assert_eq!(table.len(), 3);
    }
}
