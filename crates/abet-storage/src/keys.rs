//! Storage key constants.

/// Storage keys used by the console
pub struct StorageKeys;

impl StorageKeys {
    /// Serialized session record (JSON)
    pub const SESSION: &'static str = "session";

    /// Legacy layout: raw auth token
    pub const LEGACY_AUTH_TOKEN: &'static str = "authToken";

    /// Legacy layout: user record (JSON)
    pub const LEGACY_CURRENT_USER: &'static str = "currentUser";

    /// Legacy layout: program access list (JSON array)
    pub const LEGACY_PROGRAMS: &'static str = "programs";

    /// Legacy layout: current program id (decimal string)
    pub const LEGACY_CURRENT_PROGRAM_ID: &'static str = "currentProgramId";

    /// All keys written by the legacy two-key layout.
    pub const LEGACY: [&'static str; 4] = [
        Self::LEGACY_AUTH_TOKEN,
        Self::LEGACY_CURRENT_USER,
        Self::LEGACY_PROGRAMS,
        Self::LEGACY_CURRENT_PROGRAM_ID,
    ];
}
