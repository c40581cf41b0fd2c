pub mod client;
pub mod instruments;

pub use client::{KiteClient, NetPosition};
pub use instruments::{Instrument, InstrumentCache, ResolveError};
