//! Chrome DevTools Protocol engine.

mod client;
mod connection;
mod page;

pub use client::{BrowserProcess, CdpClient, TabInfo};
pub use connection::{CdpConnection, PageState};
pub use page::CdpEngine;
