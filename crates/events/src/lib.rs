//! Window-message plumbing between the embedded payment UI and the relay.
//!
//! - [`bus`]: transport-agnostic publish/subscribe abstraction
//! - [`in_memory_bus`]: in-process implementation used by tests and the headless binary
//! - [`envelope`]: the `{origin, data}` message shape
//! - [`bridge`]: origin-checked translation of messages into checkout callbacks

pub mod bridge;
pub mod bus;
pub mod envelope;
pub mod handler;
pub mod in_memory_bus;

pub use bridge::{BridgeError, BridgeHandle, IframeEvent, IframeEventBridge, TrustedOrigin};
pub use bus::{MessageBus, Subscription};
pub use envelope::WindowMessage;
pub use handler::CheckoutHandler;
pub use in_memory_bus::{InMemoryBusError, InMemoryMessageBus};
