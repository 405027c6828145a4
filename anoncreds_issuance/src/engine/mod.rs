pub mod base_engine;
