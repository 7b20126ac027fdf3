//! Test fixtures: fault-injecting store and transports, and a seeded board.

mod board;
mod faulty;
mod transport;

pub use board::{TestBoard, TestEngine};
pub use faulty::{Fault, FaultyStore};
pub use transport::{FaultyTransport, LinkFault, LoopbackTransport};
