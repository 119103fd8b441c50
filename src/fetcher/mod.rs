pub mod catalog_loader;
pub mod db_fetcher;
pub mod html_fetcher;

pub use catalog_loader::*;
pub use db_fetcher::*;
pub use html_fetcher::*;
