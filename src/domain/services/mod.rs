//! Domain Services
//!
//! Pure logic over domain entities. The resolver reaches the host only
//! through the [`SourceLocator`](crate::domain::ports::SourceLocator) port.

mod config_patch;
mod overlay_writer;
mod topology_resolver;

pub use config_patch::{patch_attributes, patch_term};
pub use overlay_writer::{format_entry, render_overlay_config};
pub use topology_resolver::{
    ClientRecord, HostLayout, ResolvedTopology, SourceRecord, TopologyResolver,
};
