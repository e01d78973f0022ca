/// Prefix the pipeline uses when an agent reports completion.
pub const COMPLETION_MARKER: &str = "Done!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Working,
    Done,
    Error,
}

impl EntryStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub agent_name: String,
    pub content: String,
    pub status: EntryStatus,
    pub updated_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentUpdate {
    pub agent_name: String,
    pub content: String,
    pub is_error: bool,
    pub clear_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineChange {
    Reset,
    Coalesced,
    Appended,
}

/// Ordered agent activity. Only the entry at `mutable_tail` may be rewritten.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    mutable_tail: Option<usize>,
}

impl Timeline {
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TimelineEntry> {
        self.entries.last()
    }

    pub fn working_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::Working)
            .count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.mutable_tail = None;
    }

    pub fn apply(&mut self, update: AgentUpdate, ts_ms: Option<u64>) -> TimelineChange {
        if update.clear_history {
            self.clear();
            self.push(update, ts_ms);
            return TimelineChange::Reset;
        }

        if let Some(idx) = self.mutable_tail {
            let tail = &mut self.entries[idx];
            if tail.agent_name == update.agent_name {
                tail.status = if update.is_error {
                    EntryStatus::Error
                } else if update.content.starts_with(COMPLETION_MARKER) {
                    EntryStatus::Done
                } else {
                    EntryStatus::Working
                };
                tail.content = update.content;
                tail.updated_at_ms = ts_ms;
                if tail.status != EntryStatus::Working {
                    self.mutable_tail = None;
                }
                return TimelineChange::Coalesced;
            }
        }

        self.finish_working();
        self.push(update, ts_ms);
        TimelineChange::Appended
    }

    /// Flips every working entry to done and seals the tail.
    pub fn finish_working(&mut self) {
        for entry in &mut self.entries {
            if entry.status == EntryStatus::Working {
                entry.status = EntryStatus::Done;
            }
        }
        self.mutable_tail = None;
    }

    fn push(&mut self, update: AgentUpdate, ts_ms: Option<u64>) {
        let status = if update.is_error {
            EntryStatus::Error
        } else {
            EntryStatus::Working
        };
        self.entries.push(TimelineEntry {
            agent_name: update.agent_name,
            content: update.content,
            status,
            updated_at_ms: ts_ms,
        });
        self.mutable_tail = (status == EntryStatus::Working).then(|| self.entries.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn update(agent: &str, content: &str) -> AgentUpdate {
        AgentUpdate {
            agent_name: agent.to_string(),
            content: content.to_string(),
            is_error: false,
            clear_history: false,
        }
    }

    fn summary(timeline: &Timeline) -> Vec<(&str, &str, EntryStatus)> {
        timeline
            .entries()
            .iter()
            .map(|entry| {
                (
                    entry.agent_name.as_str(),
                    entry.content.as_str(),
                    entry.status,
                )
            })
            .collect()
    }

    #[test]
    fn same_agent_updates_coalesce_and_handoff_closes_previous() {
        let mut timeline = Timeline::default();
        assert_eq!(timeline.apply(update("X", "start"), None), TimelineChange::Appended);
        assert_eq!(timeline.apply(update("X", "50%"), None), TimelineChange::Coalesced);
        assert_eq!(timeline.apply(update("Y", "go"), None), TimelineChange::Appended);

        assert_eq!(
            summary(&timeline),
            vec![
                ("X", "50%", EntryStatus::Done),
                ("Y", "go", EntryStatus::Working),
            ]
        );
    }

    #[test]
    fn completion_marker_seals_the_tail() {
        let mut timeline = Timeline::default();
        timeline.apply(update("Tester", "Running pytest..."), None);
        timeline.apply(update("Tester", "Done! Tests executed and passed."), None);
        assert_eq!(timeline.apply(update("Tester", "again"), None), TimelineChange::Appended);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.entries()[0].status, EntryStatus::Done);
    }

    #[test]
    fn error_update_marks_entry_failed_and_stops_coalescing() {
        let mut timeline = Timeline::default();
        timeline.apply(update("Tester", "Running"), None);
        let mut failed = update("Tester", "Done! Tests executed with failures.");
        failed.is_error = true;
        timeline.apply(failed, Some(7));

        let last = timeline.last().expect("entry");
        assert_eq!(last.status, EntryStatus::Error);
        assert_eq!(last.updated_at_ms, Some(7));
        assert_eq!(timeline.working_count(), 0);
    }

    #[test]
    fn clear_history_replaces_everything_with_one_entry() {
        let mut timeline = Timeline::default();
        timeline.apply(update("A", "1"), None);
        timeline.apply(update("B", "2"), None);
        let mut restart = update("System", "Starting Auto-Fix Cycle (Iteration 2)");
        restart.clear_history = true;

        assert_eq!(timeline.apply(restart, None), TimelineChange::Reset);
        assert_eq!(
            summary(&timeline),
            vec![(
                "System",
                "Starting Auto-Fix Cycle (Iteration 2)",
                EntryStatus::Working
            )]
        );
    }

    #[test]
    fn fresh_entry_stays_working_even_with_completion_prefix() {
        let mut timeline = Timeline::default();
        timeline.apply(update("A", "Done! first"), None);
        assert_eq!(timeline.entries()[0].status, EntryStatus::Working);
        timeline.apply(update("A", "second"), None);
        assert_eq!(timeline.len(), 1);
        timeline.finish_working();
        timeline.apply(update("A", "third"), None);
        assert_eq!(timeline.len(), 2);
    }
}
