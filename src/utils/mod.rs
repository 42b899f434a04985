pub mod code_generator;

pub use code_generator::generate_discount_code;
