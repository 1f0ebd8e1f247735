//! Small helpers shared by the client and the CLI.
//!
//! - **URL validation**: the API base must be HTTPS unless it is localhost
//! - **Text processing**: control-character stripping and column-aware truncation
//! - **Tasks**: panic capture for user-triggered work
//!
//! ```
//! use catalog_admin::util::{strip_control_chars, truncate_to_width};
//!
//! assert_eq!(strip_control_chars("\x1b[31mShoes\x1b[0m"), "Shoes");
//! assert_eq!(truncate_to_width("Garden Furniture", 9), "Garden...");
//! ```

mod task;
mod text;
mod url_validator;

pub use task::catch_task_panic;
pub use text::{display_width, pad_to_width, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_base_url, UrlValidationError};
