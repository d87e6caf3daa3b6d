// ── Dashboard payload model ──
//
// Typed views of the three channel payloads. Every type decodes
// leniently: missing fields take defaults and unknown enum values map to
// an `Unknown` variant, so a newer backend never breaks an older client.

pub mod collaboration;
pub mod performance;
pub mod task;

pub use collaboration::{
    CollaborationEdge, CollaborationFlow, CollaborationNode, EdgeType, NodeStatus, NodeType,
};
pub use performance::{PerformanceHistory, PerformanceSnapshot, Throughput, UsageTotals};
pub use task::{Task, TaskStatus, TaskSummary};
