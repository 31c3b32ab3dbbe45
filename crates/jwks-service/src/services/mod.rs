pub mod rotation_engine;
pub mod token_service;
