pub mod domain;
pub mod memory;
pub mod ports;
pub mod router;
pub mod session;
pub mod voucher;

pub use domain::{
    AuthState, Credentials, Document, LoginGrant, Session, SubmitOutcome, UserProfile,
    VoucherRecord, VoucherStatus, VoucherStatusReport,
};
pub use memory::MemorySessionStore;
pub use ports::{PortError, PortResult, PortalApi, SessionStore};
pub use router::{DashboardTab, View};
pub use session::SessionContext;
pub use voucher::{derive_status, VoucherTracker};
