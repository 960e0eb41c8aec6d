//! Unit tests - public API of individual components, no database required

mod expression_tests;
mod filter_tests;
mod naming_tests;
