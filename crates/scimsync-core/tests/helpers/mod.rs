pub mod mock_remote;
pub mod test_data;
