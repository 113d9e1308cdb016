pub mod types;
pub mod user_input_delegate;
pub mod utils;
