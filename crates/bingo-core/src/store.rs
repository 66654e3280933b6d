use crate::error::Result;
use crate::types::GameRecord;

/// Persistence collaborator for the flat game record.
///
/// Implementations must round-trip a `GameRecord` exactly; the session is
/// rebuilt from whatever `load` returns.
pub trait GameStore: Send + Sync {
    /// Overwrite the saved record.
    fn save(&self, record: &GameRecord) -> Result<()>;

    /// The saved record, if any.
    fn load(&self) -> Result<Option<GameRecord>>;

    /// Forget the saved record.
    fn clear(&self) -> Result<()>;
}
