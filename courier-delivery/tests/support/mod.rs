pub mod flaky_store;
pub mod http_server;
pub mod mock_transport;
