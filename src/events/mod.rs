//! # Events Module
//!
//! Event-driven architecture for GUI-ready progress reporting.
//!
//! ## Design
//! The detector emits progress, log, stats and pipeline events through a
//! channel, allowing any UI (CLI, GUI, web) to subscribe and display them.
//! Delivery is advisory: the detector never waits for a listener.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Progress(p) => println!("{}: {}/{}", p.phase, p.completed, p.total),
//!             Event::Log(entry) => println!("[{}] {}", entry.level, entry.message),
//!             _ => {}
//!         }
//!     }
//! });
//!
//! let detector = DuplicateDetector::builder().events(sender).build();
//! detector.run(&folder, &CancellationToken::new())?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
