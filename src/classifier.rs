use crate::models::{Binary, Outcome, Status};

/// Result of classifying one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub binary: Binary,
    /// Whether `status` differs from the status it replaces.
    pub changed: bool,
}

/// Map the previous state and a fresh outcome to the next state.
///
/// Flapping is reported whenever the observed binary state differs from the
/// one before it. The returned `binary` is always the observed value, never
/// Flapping, so the next call compares against what was actually seen.
pub fn classify(prev_status: Status, prev_binary: Option<Binary>, outcome: &Outcome) -> Classification {
    let binary = if outcome.is_success() { Binary::Up } else { Binary::Down };

    let status = match prev_binary {
        Some(prev) if prev != binary => Status::Flapping,
        _ => binary.into(),
    };

    Classification { status, binary, changed: status != prev_status }
}
