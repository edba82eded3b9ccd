mod events;
mod poller;
mod query;
mod snapshot;

pub use events::{RefreshHandle, RefreshUpdate, create_refresh_handle};
pub use poller::{DiscoveryPoller, PollerSettings};
pub use query::{MISSING_FIELDS, PeerInfo, Query, QueryService, SnapshotStatus};
pub use snapshot::{Snapshot, SnapshotStore};
