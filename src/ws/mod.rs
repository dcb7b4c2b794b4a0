pub mod outbox;
pub mod registry;
pub mod router;
pub mod sync;

pub use outbox::{Outbox, OutboxReceiver, OverflowSignal};
pub use registry::{ConnectionId, Departure, Participant, SessionRegistry};
pub use router::{BroadcastRouter, Delivery};
pub use sync::{HandOff, RelayRejected, SyncCoordinator};
