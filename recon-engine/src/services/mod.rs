//! Services module for recon-engine.

pub mod memory;
pub mod metrics;
pub mod payments;
pub mod session;
pub mod store;
pub mod summary;

pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics, record_error, record_payment_commit,
    record_session_operation};
pub use payments::{build_payment, record_manual_payment, PaymentInput};
pub use session::{SessionEngine, StartSession};
pub use store::PaymentStore;
pub use summary::{session_summary, summarize};
