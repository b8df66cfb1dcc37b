//! Order book reconstruction module.
//!
//! Two granularities over the same ordered-side building block:
//! - [`PriceLevelBook`]: aggregated quantity per price (L2)
//! - [`OrderLevelBook`]: individual orders with add/modify/delete (L3)

mod config;
pub mod level_queue;
mod multi_symbol;
pub mod order_book;
pub mod price_book;
pub mod side_book;

pub use config::BookConfig;
pub use level_queue::{LevelQueue, OrderHandle, OrderSlot};
pub use multi_symbol::{MultiSymbolBooks, ReconstructedBook, SymbolStats};
pub use order_book::{EventCounters, OrderLevelBook};
pub use price_book::PriceLevelBook;
pub use side_book::SideBook;
