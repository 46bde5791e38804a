pub mod recording_notifier;
pub mod temp_state;
