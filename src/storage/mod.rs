pub mod image_store;
pub mod report_writer;
pub mod storage_manager;

pub use image_store::*;
pub use report_writer::*;
pub use storage_manager::*;
