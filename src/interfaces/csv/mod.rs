pub mod event_reader;
