pub mod format;
pub mod format_table;
pub mod surface_desc;
pub mod surface_state;
