//! Item bank trait: the read-only source of calibrated items.

use crate::error::BankError;
use crate::item::Item;

/// A deterministic loader returning the full item set.
///
/// Called once at startup; the result is safe to share for the process lifetime.
pub trait ItemBank: Send + Sync {
    /// Where the items come from (file path, "static", ...), for logs.
    fn source(&self) -> String;

    /// Load every item, in bank order.
    fn load(&self) -> Result<Vec<Item>, BankError>;
}
