
pub mod agent;
pub mod batch;
pub mod blocking;
pub mod enrichment;
pub mod event;
pub mod firewall;
pub mod wire;

pub use agent::{AgentHealth, AgentRecord, AgentStatus, HeartbeatRecord, HostMetrics};
pub use batch::{BatchStatus, LogBatchRecord};
pub use blocking::{
    BlockActionKind, BlockSource, BlockingActionRecord, BlockingRuleRecord, Fail2banEventRecord,
    IpBlockRecord, RuleKind,
};
pub use enrichment::{IpGeoRecord, ThreatLevel};
pub use event::{AuthEvent, AuthMethod, EventType, MlAssessment, SourceType};
pub use firewall::{
    CommandDirective, CommandStatus, DefaultPolicy, FirewallAction, FirewallInventory,
    ListeningPortEntry, LoggingLevel, PolicyDirection, Protocol, UfwCommandRecord, UfwRuleEntry,
    UfwStatusSnapshot,
};
pub use wire::{
    Acknowledgement, CommandResultReport, ErrorEnvelope, HeartbeatRequest, LogBatchRequest,
    LogBatchResponse, PendingCommandsResponse, RegisterRequest, RegisterResponse, UfwSyncRequest,
    UfwSyncResponse,
};
