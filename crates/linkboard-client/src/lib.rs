//! # linkboard-client
//!
//! Dual-channel connection-status coordinator.
//!
//! - **Store**: [`StatusStore`] holds one provenance-tagged value per connection
//! - **Actions**: connect/disconnect over HTTP with optimistic display,
//!   confirmation timeout, and rollback
//! - **Push**: validated dispatch of push-channel events behind [`PushSource`]
//! - **Proxy**: on-demand check of the server's configured proxy
//! - **Relay**: cross-tab sharing of push-confirmed state over a [`MessageBus`]
//! - **Runtime**: one event-loop task per coordinator, driven through a
//!   [`CoordinatorHandle`]
//!
//! # Usage
//!
//! ```no_run
//! # async fn demo() -> Result<(), linkboard_client::CoordinatorError> {
//! use linkboard_client::CoordinatorBuilder;
//! use linkboard_core::{ConnectionId, ConnectionState};
//!
//! let handle = CoordinatorBuilder::new(Default::default()).spawn();
//! let outcome = handle
//!     .request_transition(ConnectionId::Primary, ConnectionState::Connecting)
//!     .await?;
//! println!("{outcome:?}");
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod actions;
pub mod broadcaster;
pub mod bus;
pub mod coordinator;
pub mod errors;
pub mod pending;
pub mod presenter;
pub mod proxy;
pub mod push;
pub mod runtime;
pub mod session;
pub mod store;
pub mod test_utils;

pub use actions::{
    ActionIntent, ActionOutcome, ActionRequest, ActionTransport, HttpActionTransport,
    SessionEndNotifier,
};
pub use broadcaster::Broadcaster;
pub use bus::{BusSubscription, MessageBus, NullBus, SharedStore, StorageBus};
pub use coordinator::StatusSnapshot;
pub use errors::{ActionError, BusError, CoordinatorError};
pub use presenter::{Presenter, TracingPresenter};
pub use proxy::{ProxyCheck, ProxyConfig, ProxyChecker, ProxyTestResult};
pub use push::{PushSink, PushSource, PushSourceEvent};
pub use runtime::{CoordinatorBuilder, CoordinatorHandle};
pub use session::Session;
pub use store::{StateChange, StatusStore, StoreObserver};
