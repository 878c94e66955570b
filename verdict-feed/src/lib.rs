//! verdict-feed library
//!
//! Polls a trial-verdict feed, pairs each defendant's charge rows and renders
//! them as HTML fragments. Also publishes spreadsheet exports into the
//! feed's flatfiles.

pub mod aggregator;
pub mod diagnostics;
pub mod feed;
pub mod normalize;
pub mod publish;
pub mod render;
pub mod settings;
pub mod sheet;
pub mod target;

pub use aggregator::{Aggregator, CycleContext, CycleOutcome, CycleReport, Readiness, SliceResult};
pub use feed::{FeedClient, FeedFormat, FeedProfile, RawRecord, SliceName};
pub use normalize::{normalize_charge, slugify, VerdictTable};
pub use render::{render_pass, RenderSettings};
pub use settings::Settings;
