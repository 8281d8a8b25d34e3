mod build_tests;
mod clean_tests;
mod common;
