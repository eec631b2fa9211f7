//! Self-describing property format for peers whose layouts may differ, such
//! as recordings played back by a newer build.

mod export_group;
mod reader;
mod writer;

pub use export_group::{NetFieldExport, NetFieldExportGroup};
pub use reader::receive_properties_compat;
pub use writer::send_properties_compat;
