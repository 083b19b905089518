/// Outcome of a skip request against the current listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    /// Admin, or the voter is the only listener.
    Forced,
    Passed,
    Pending { votes: usize, required: usize },
}

/// Votes needed to skip with `listeners` non-bot members in the channel.
pub fn required_votes(listeners: usize) -> usize {
    (listeners / 2).max(2)
}

/// `in_channel` says whether the voter is one of the `listeners`.
pub fn decide(votes: usize, listeners: usize, is_admin: bool, in_channel: bool) -> SkipDecision {
    if is_admin || (in_channel && listeners == 1) {
        return SkipDecision::Forced;
    }

    let required = required_votes(listeners);
    if votes >= required {
        SkipDecision::Passed
    } else {
        SkipDecision::Pending { votes, required }
    }
}
