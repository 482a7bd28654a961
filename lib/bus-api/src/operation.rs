//! Resource-change operations and their wire codes

use serde::{Deserialize, Serialize};

/// Operation carried by an envelope, encoded on the wire as a bare
/// integer code for compatibility with non-Rust producers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum Operation {
    /// Add resources
    Add,
    /// Modify existing resources
    Modify,
    /// Load resources (bulk sync)
    Load,
    /// Delete resources
    Delete,
    /// Acknowledgement: the handler completed normally
    CallbackSuccess,
    /// Acknowledgement: the handler failed
    CallbackException,
    /// Unrecognized code, preserved losslessly; dispatched as Add
    Other(u8),
}

const CODE_ADD: u8 = 0;
const CODE_MODIFY: u8 = 1;
const CODE_LOAD: u8 = 2;
const CODE_DELETE: u8 = 3;
const CODE_CALLBACK_SUCCESS: u8 = 11;
const CODE_CALLBACK_EXCEPTION: u8 = 12;

impl Operation {
    /// Whether this operation is a callback (acknowledgement) rather
    /// than a resource-change request.
    pub fn is_callback(&self) -> bool {
        matches!(self, Operation::CallbackSuccess | Operation::CallbackException)
    }

    /// The integer wire code for this operation
    pub fn code(&self) -> u8 {
        match self {
            Operation::Add => CODE_ADD,
            Operation::Modify => CODE_MODIFY,
            Operation::Load => CODE_LOAD,
            Operation::Delete => CODE_DELETE,
            Operation::CallbackSuccess => CODE_CALLBACK_SUCCESS,
            Operation::CallbackException => CODE_CALLBACK_EXCEPTION,
            Operation::Other(code) => *code,
        }
    }
}

impl From<u8> for Operation {
    fn from(code: u8) -> Self {
        match code {
            CODE_ADD => Operation::Add,
            CODE_MODIFY => Operation::Modify,
            CODE_LOAD => Operation::Load,
            CODE_DELETE => Operation::Delete,
            CODE_CALLBACK_SUCCESS => Operation::CallbackSuccess,
            CODE_CALLBACK_EXCEPTION => Operation::CallbackException,
            other => Operation::Other(other),
        }
    }
}

impl From<Operation> for u8 {
    fn from(operation: Operation) -> Self {
        operation.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_code_round_trip() {
        for code in 0u8..=255 {
            let operation = Operation::from(code);
            assert_eq!(operation.code(), code);
        }
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(Operation::from(0), Operation::Add);
        assert_eq!(Operation::from(1), Operation::Modify);
        assert_eq!(Operation::from(2), Operation::Load);
        assert_eq!(Operation::from(3), Operation::Delete);
        assert_eq!(Operation::from(11), Operation::CallbackSuccess);
        assert_eq!(Operation::from(12), Operation::CallbackException);
    }

    #[test]
    fn test_unrecognized_code_preserved() {
        assert_eq!(Operation::from(42), Operation::Other(42));
        assert_eq!(Operation::Other(42).code(), 42);
    }

    #[test]
    fn test_is_callback() {
        assert!(Operation::CallbackSuccess.is_callback());
        assert!(Operation::CallbackException.is_callback());
        assert!(!Operation::Add.is_callback());
        assert!(!Operation::Delete.is_callback());
        assert!(!Operation::Other(42).is_callback());
    }

    #[test]
    fn test_serde_as_integer() {
        let json = serde_json::to_string(&Operation::Delete).unwrap();
        assert_eq!(json, "3");

        let operation: Operation = serde_json::from_str("11").unwrap();
        assert_eq!(operation, Operation::CallbackSuccess);
    }
}
