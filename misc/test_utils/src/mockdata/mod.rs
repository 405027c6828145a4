pub mod mock_engine;
pub mod mock_notifier;
pub mod mock_registrar;
pub mod mock_tails_server;
