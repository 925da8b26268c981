//! Completion signal wire format.
//!
//! Workers report stage outcomes as single lines:
//!
//! ```text
//! <kind>_<done|failed>|<batchId>|<value>|<threads>
//! hack_done|foodnstuff-1690000000000|125000|20
//! ```
//!
//! `value` is the extracted amount for `hack`, the growth multiplier for `grow` and
//! the security reduction for both weaken stages.

use serde::{Deserialize, Serialize};

use crate::core::error::SignalParseError;
use crate::core::model::StageKind;

const FIELD_SEPARATOR: char = '|';
const DONE: &str = "done";
const FAILED: &str = "failed";

/// A parsed completion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSignal {
    /// Stage that finished.
    pub kind: StageKind,
    /// Batch the stage belongs to.
    pub batch_id: String,
    /// Whether the stage reported success.
    pub success: bool,
    /// Stage-specific numeric result.
    pub value: f64,
    /// Threads the stage ran with.
    pub threads: u32,
}

impl CompletionSignal {
    /// Parse one raw signal.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalParseError`] describing the first malformed field.
    pub fn parse(raw: &str) -> Result<Self, SignalParseError> {
        let fields: Vec<&str> = raw.trim().split(FIELD_SEPARATOR).collect();
        let [head, batch_id, value, threads] = fields.as_slice() else {
            return Err(SignalParseError::FieldCount(fields.len()));
        };

        let (kind, outcome) = head
            .rsplit_once('_')
            .ok_or_else(|| SignalParseError::UnknownOutcome((*head).to_string()))?;
        let kind =
            StageKind::from_wire(kind).ok_or_else(|| SignalParseError::UnknownKind(kind.into()))?;
        let success = match outcome {
            DONE => true,
            FAILED => false,
            other => return Err(SignalParseError::UnknownOutcome(other.into())),
        };

        if batch_id.is_empty() {
            return Err(SignalParseError::EmptyBatchId);
        }

        let value = value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| SignalParseError::InvalidNumber {
                field: "value",
                value: (*value).to_string(),
            })?;
        let threads = threads
            .parse::<u32>()
            .map_err(|_| SignalParseError::InvalidNumber {
                field: "threads",
                value: (*threads).to_string(),
            })?;

        Ok(Self {
            kind,
            batch_id: (*batch_id).to_string(),
            success,
            value,
            threads,
        })
    }

    /// Render the signal in wire format.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let outcome = if self.success { DONE } else { FAILED };
        format!(
            "{}_{outcome}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.kind.wire_name(),
            self.batch_id,
            self.value,
            self.threads
        )
    }
}

/// Batch id for a target and dispatch timestamp.
#[must_use]
pub fn batch_id(target: &str, dispatch_time_ms: u64) -> String {
    format!("{target}-{dispatch_time_ms}")
}
