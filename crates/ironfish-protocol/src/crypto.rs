use std::sync::OnceLock;

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Performs process-wide cryptographic setup.
///
/// Must be called once before any proof verification. Subsequent calls are no-ops. This is the
/// only process-wide singleton the core permits; everything else is passed in at construction.
pub fn initialize() {
    INITIALIZED.get_or_init(|| ());
}

/// Returns true if [`initialize`] has been called.
pub fn is_initialized() -> bool {
    INITIALIZED.get().is_some()
}
