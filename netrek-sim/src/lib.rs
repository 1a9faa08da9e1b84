//! Deterministic tick-driven simulation core: spatial index, entity model,
//! event bus, and the simulation itself (spec §4.1-§4.4). No networking
//! dependency, so it is unit- and property-testable in isolation.

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod simulation;
pub mod snapshot;
pub mod spatial;

pub use config::SimulationConfig;
pub use error::SimError;
pub use events::{Event, EventBus, EventKind, Subscription};
pub use model::ShipClass;
pub use simulation::{BeamDirection, SimStatus, Simulation, WinConditionStrategy};
pub use spatial::{EntityRef, QuadTree, Rect};
