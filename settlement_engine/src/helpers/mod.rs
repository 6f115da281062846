mod order_number;
mod tracking;

pub use order_number::{is_valid_order_number, new_order_number};
pub use tracking::{month_start, normalize_tracking_code};
