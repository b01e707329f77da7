pub mod admin_commands;
pub mod browse_commands;
pub mod playback_commands;
pub mod queue_commands;
pub mod search_commands;
