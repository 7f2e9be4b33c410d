pub mod args;

pub use args::{is_pdf_path, Args, BackendChoice};
