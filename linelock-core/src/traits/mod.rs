pub mod acknowledger;
pub mod audio_subsystem;
pub mod sequencer_delegate;
pub mod side_effects;
