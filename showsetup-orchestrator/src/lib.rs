//! Show provisioning.
//!
//! Creates a show's depot, protection lines, groups and streams against a
//! [`showsetup_backend::Backend`], recording each completed step so a failure
//! can be compensated. Runs are strictly sequential; concurrent runs against
//! the same protection table surface as duplicate-entry failures.

pub mod context;
pub mod error;
pub mod groups;
pub mod ledger;
pub mod orchestrator;
pub mod protections;
pub mod rollback;
pub mod streams;

pub use context::ProvisioningContext;
pub use error::{ProvisionError, Result};
pub use groups::ensure_group;
pub use ledger::{GroupRecord, Ledger, LedgerCategory, LedgerEntry, StreamRecord};
pub use orchestrator::{
    ProvisionOptions, Provisioner, ProvisioningFailure, ProvisioningReport, ProvisioningState,
};
pub use protections::{apply_entries, check_entries, insert_entries, remove_entries};
pub use rollback::{roll_back, RollbackFailure, RollbackReport, ROLLBACK_ORDER};
pub use streams::{create_stream, StreamFailure};
