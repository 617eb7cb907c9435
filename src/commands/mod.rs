// Provisioning commands, all routed through the mode controller
pub mod deploy;
pub mod destroy;
pub mod redeploy;

// Read-only commands
pub mod doctor;
pub mod stages;
pub mod status;
