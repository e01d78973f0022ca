use super::config::Config;
use super::config::WorkspaceConfig;
use super::log_stream::LogStreams;
use super::log_stream::TerminalBuffer;
use super::mutation::MutationContext;
use super::mutation::MutationId;
use super::mutation::MutationPhase;
use super::mutation::MutationPlan;
use super::mutation::MutationRequest;
use super::path_key::CasePolicy;
use super::pipeline::PipelineState;
use super::store::WorkspaceStore;
use super::tabs::OpenFiles;
use super::timeline::Timeline;
use super::tree;
use super::tree::Projection;

/// A mutation waiting on the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub id: MutationId,
    pub request: MutationRequest,
    pub plan: MutationPlan,
}

#[derive(Debug, Clone)]
pub struct WorkspaceState {
    pub store: WorkspaceStore,
    pub tabs: OpenFiles,
    pub timeline: Timeline,
    pub logs: LogStreams,
    pub terminal: TerminalBuffer,
    pub pipeline: PipelineState,
    pub pending: Vec<PendingMutation>,
    pub case_policy: CasePolicy,
    /// Most recent error surfaced to the user.
    pub last_error: Option<String>,
    next_mutation_id: u64,
}

impl WorkspaceState {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            store: WorkspaceStore::new(),
            tabs: OpenFiles::default(),
            timeline: Timeline::default(),
            logs: LogStreams::new(config.terminal_logs.iter().cloned()),
            terminal: TerminalBuffer::new(config.terminal_capacity.max(1)),
            pipeline: PipelineState::default(),
            pending: Vec::new(),
            case_policy: config.case_policy,
            last_error: None,
            next_mutation_id: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.workspace)
    }

    pub fn projection(&self) -> Projection<'_> {
        tree::project(&self.store)
    }

    pub fn pending(&self, id: MutationId) -> Option<&PendingMutation> {
        self.pending.iter().find(|pending| pending.id == id)
    }

    /// `PersistingRemote` while the collaborator has not answered; settled ids are
    /// only known through their report.
    pub fn mutation_phase(&self, id: MutationId) -> Option<MutationPhase> {
        self.pending(id).map(|_| MutationPhase::PersistingRemote)
    }

    pub fn reserved_destinations(&self) -> Vec<String> {
        self.pending
            .iter()
            .flat_map(|pending| pending.plan.change.destinations())
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn mutation_context<'a>(&'a self, reserved: &'a [String]) -> MutationContext<'a> {
        MutationContext {
            store: &self.store,
            policy: self.case_policy,
            reserved,
        }
    }

    pub(crate) fn allocate_mutation_id(&mut self) -> MutationId {
        self.next_mutation_id += 1;
        MutationId(self.next_mutation_id)
    }
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self::new(&WorkspaceConfig::default())
    }
}
