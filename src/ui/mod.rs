pub mod icons;
pub mod output;
pub mod palette;
pub mod table;

pub use icons::Icons;
pub use output::{error, header, info, scope_line, section, status, success, warn};
pub use palette::{Palette, palette};
pub use table::{ColorRow, DependencyRow, FieldRow, TableBuilder, stats_table};
