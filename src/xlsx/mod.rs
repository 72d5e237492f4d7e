//! Low-level XLSX writing: string pool, sheets, drawings and package parts

pub mod drawing;
pub mod package;
pub mod parts;
pub mod shared_strings;
pub mod worksheet;
pub mod xml_writer;

pub use package::{write_package, PackagePart};
pub use shared_strings::SharedStrings;
pub use worksheet::{cell_ref, column_letter, SheetModel};
pub use xml_writer::XmlWriter;
