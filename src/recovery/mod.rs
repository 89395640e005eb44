//! Guardian registry, recovery protocol and share expiry.

pub mod clock;
pub mod events;
pub mod expiry;
pub mod protocol;
pub mod registry;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventLog, MAX_EVENTS, RecoveryEvent, RecoveryEventType};
pub use expiry::{ExpiryMonitor, ExpiryNotification, ExpiryReport, ExpirySeverity};
pub use registry::{GuardianRegistry, MAX_GUARDIANS, MIN_GUARDIANS, MIN_TIME_LOCK_HOURS};
pub use types::{
    CollectedShare, ExpiryPolicy, Guardian, GuardianDescriptor, GuardianShare, GuardianUpdate,
    RecoveryConfig, RecoveryOptions, RecoveryRequest, RecoverySnapshot, RecoveryStatus,
    ShamirConfig, ShareDistribution, ShareInfo, SocialConfig,
};
